use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};

use kmeta_core::{KmetaError, KmetaResult};

/// Typed view over a flat tool-argument object.
///
/// Absent and `null` read as unset. A value of the wrong JSON type is an
/// input error rather than being ignored.
#[derive(Clone, Copy)]
pub(crate) struct Args<'a>(pub(crate) &'a Map<String, Json>);

impl<'a> Args<'a> {
    fn raw(&self, key: &str) -> Option<&'a Json> { self.0.get(key).filter(|v| !v.is_null()) }

    /// Non-empty string argument.
    pub fn str(&self, key: &str) -> KmetaResult<Option<&'a str>> {
        match self.raw(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.as_str()).filter(|s| !s.is_empty())),
            Some(_) => Err(KmetaError::Input(format!("argument '{key}' must be a string"))),
        }
    }

    pub fn string(&self, key: &str) -> KmetaResult<String> { Ok(self.str(key)?.unwrap_or_default().to_string()) }

    pub fn require(&self, key: &str) -> KmetaResult<&'a str> {
        self.str(key)?.ok_or_else(|| KmetaError::Input(format!("{key} is required")))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> KmetaResult<bool> {
        match self.raw(key) {
            None => Ok(default),
            Some(Json::Bool(b)) => Ok(*b),
            Some(_) => Err(KmetaError::Input(format!("argument '{key}' must be a boolean"))),
        }
    }

    pub fn number(&self, key: &str) -> KmetaResult<Option<f64>> {
        match self.raw(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| KmetaError::Input(format!("argument '{key}' must be a number"))),
        }
    }

    /// String argument holding a JSON array; unset reads as empty.
    pub fn json_list<T: DeserializeOwned>(&self, key: &str) -> KmetaResult<Vec<T>> {
        match self.str(key)? {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(text).map_err(|e| KmetaError::Input(format!("{key} is not a valid JSON array: {e}"))),
        }
    }

    /// Comma separated names, trimmed, empties dropped.
    pub fn csv(&self, key: &str) -> KmetaResult<Vec<String>> {
        Ok(self
            .str(key)?
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Json) -> Map<String, Json> {
        match v {
            Json::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn strings_and_defaults() {
        let m = map(json!({ "name": "a", "empty": "", "n": null, "flag": false }));
        let a = Args(&m);
        assert_eq!(a.require("name").unwrap(), "a");
        assert_eq!(a.require("empty").unwrap_err().to_string(), "empty is required");
        assert_eq!(a.str("n").unwrap(), None);
        assert!(!a.bool_or("flag", true).unwrap());
        assert!(a.bool_or("missing", true).unwrap());
    }

    #[test]
    fn wrong_types_are_rejected() {
        let m = map(json!({ "dry_run": "yes", "name": 3, "port": "80" }));
        let a = Args(&m);
        assert!(a.bool_or("dry_run", false).is_err());
        assert!(a.str("name").is_err());
        assert!(a.number("port").is_err());
    }

    #[test]
    fn json_lists_and_csv() {
        let m = map(json!({ "args_json": "[\"-y\", \"pkg\"]", "bad": "[oops", "servers": " a, ,b " }));
        let a = Args(&m);
        assert_eq!(a.json_list::<String>("args_json").unwrap(), ["-y", "pkg"]);
        assert!(matches!(a.json_list::<String>("bad"), Err(KmetaError::Input(_))));
        assert!(a.json_list::<String>("absent").unwrap().is_empty());
        assert_eq!(a.csv("servers").unwrap(), ["a", "b"]);
    }
}
