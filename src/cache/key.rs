//! Cache Key Module
//!
//! Deterministic key derivation from a namespace, a function identity and
//! the call's arguments.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};

use serde::Serialize;

use super::Codec;
use crate::error::Result;
use crate::store::escape_pattern;

/// Separator between key segments
pub const KEY_SEPARATOR: char = ':';

// == Cache Key ==
/// Identifies one cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

// == Call Args ==
/// Canonical string forms of a call's arguments.
///
/// Positional arguments keep call order. Keyword arguments are kept sorted
/// by name so the key does not depend on the order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallArgs {
    positional: Vec<String>,
    keyword: BTreeMap<String, String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a positional argument by its `Display` form.
    pub fn arg(mut self, value: impl Display) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Adds a positional argument by its `Debug` form.
    pub fn arg_debug(mut self, value: impl Debug) -> Self {
        self.positional.push(format!("{:?}", value));
        self
    }

    /// Adds a keyword argument by its `Display` form.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.keyword.insert(name.into(), value.to_string());
        self
    }

    /// Adds a keyword argument by its `Debug` form.
    pub fn kwarg_debug(mut self, name: impl Into<String>, value: impl Debug) -> Self {
        self.keyword.insert(name.into(), format!("{:?}", value));
        self
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, String> {
        &self.keyword
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Only the first positional argument, as used by ignore-args mode.
    fn discriminator(&self) -> CallArgs {
        CallArgs {
            positional: vec![self.positional.first().cloned().unwrap_or_default()],
            keyword: BTreeMap::new(),
        }
    }

    /// Positional values, then each keyword name followed by its value.
    fn concatenated(&self) -> String {
        let mut material = self.positional.concat();
        for (name, value) in &self.keyword {
            material.push_str(name);
            material.push_str(value);
        }
        material
    }
}

// == Key Builder ==
/// Derives cache keys under a fixed hashing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBuilder {
    hash_keys: bool,
    codec: Codec,
}

impl KeyBuilder {
    /// # Arguments
    /// * `hash_keys` - MD5 the argument material (true) or encode it verbatim
    /// * `codec` - Codec used for verbatim key material
    pub fn new(hash_keys: bool, codec: Codec) -> Self {
        Self { hash_keys, codec }
    }

    pub fn hash_keys(&self) -> bool {
        self.hash_keys
    }

    // == Build ==
    /// Derives the key for one call.
    ///
    /// With `ignore_args` only the first positional argument participates.
    /// The result is `namespace:function_id:material` when a namespace is
    /// given and just `material` otherwise.
    pub fn build(
        &self,
        namespace: Option<&str>,
        ignore_args: bool,
        function_id: &str,
        args: &CallArgs,
    ) -> Result<CacheKey> {
        let discriminator;
        let args = if ignore_args {
            discriminator = args.discriminator();
            &discriminator
        } else {
            args
        };

        let material = if self.hash_keys {
            digest(&args.concatenated())
        } else {
            self.encode_material(args)?
        };

        Ok(CacheKey(match namespace {
            Some(namespace) => format!(
                "{}{sep}{}{sep}{}",
                namespace,
                function_id,
                material,
                sep = KEY_SEPARATOR
            ),
            None => material,
        }))
    }

    fn encode_material(&self, args: &CallArgs) -> Result<String> {
        let bytes = self.codec.encode(&(&args.positional, &args.keyword))?;
        Ok(match self.codec {
            Codec::Json => String::from_utf8_lossy(&bytes).into_owned(),
            Codec::Bincode => hex::encode(bytes),
        })
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(true, Codec::default())
    }
}

/// 128-bit MD5 digest as lowercase hex.
pub fn digest(material: &str) -> String {
    format!("{:x}", md5::compute(material.as_bytes()))
}

/// Pattern matching every key in `namespace`.
///
/// Glob characters in the namespace are escaped, so `ord*` never reaches
/// into `orders`.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{}{}*", escape_pattern(namespace), KEY_SEPARATOR)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CallArgs {
        CallArgs::new().arg(7).arg("north").kwarg("limit", 10)
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = KeyBuilder::default();
        let first = builder.build(Some("orders"), false, "list", &args()).unwrap();
        let second = builder.build(Some("orders"), false, "list", &args()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_namespaced_key_layout() {
        let key = KeyBuilder::default()
            .build(Some("orders"), false, "list", &args())
            .unwrap();
        let parts: Vec<&str> = key.as_str().split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "orders");
        assert_eq!(parts[1], "list");
        assert_eq!(parts[2], digest("7northlimit10"));
        assert_eq!(parts[2].len(), 32);
    }

    #[test]
    fn test_key_without_namespace_is_bare_digest() {
        let key = KeyBuilder::default().build(None, false, "list", &args()).unwrap();
        assert_eq!(key.as_str(), digest("7northlimit10"));
    }

    #[test]
    fn test_md5_known_value() {
        assert_eq!(digest(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_keyword_order_does_not_matter() {
        let builder = KeyBuilder::default();
        let a = CallArgs::new().kwarg("a", 1).kwarg("b", 2);
        let b = CallArgs::new().kwarg("b", 2).kwarg("a", 1);
        assert_eq!(
            builder.build(Some("ns"), false, "f", &a).unwrap(),
            builder.build(Some("ns"), false, "f", &b).unwrap()
        );
    }

    #[test]
    fn test_positional_order_matters() {
        let builder = KeyBuilder::default();
        let a = CallArgs::new().arg(1).arg(2);
        let b = CallArgs::new().arg(2).arg(1);
        assert_ne!(
            builder.build(None, false, "f", &a).unwrap(),
            builder.build(None, false, "f", &b).unwrap()
        );
    }

    #[test]
    fn test_ignore_args_uses_first_positional_only() {
        let builder = KeyBuilder::default();
        let a = CallArgs::new().arg("req-1").arg(1).kwarg("x", "y");
        let b = CallArgs::new().arg("req-1").arg(99);
        let c = CallArgs::new().arg("req-2").arg(1);

        let key_a = builder.build(Some("ns"), true, "f", &a).unwrap();
        assert_eq!(key_a, builder.build(Some("ns"), true, "f", &b).unwrap());
        assert_ne!(key_a, builder.build(Some("ns"), true, "f", &c).unwrap());
    }

    #[test]
    fn test_ignore_args_without_positional() {
        let builder = KeyBuilder::default();
        let key = builder
            .build(None, true, "f", &CallArgs::new().kwarg("x", 1))
            .unwrap();
        assert_eq!(key.as_str(), digest(""));
    }

    #[test]
    fn test_function_id_separates_namespaced_keys() {
        let builder = KeyBuilder::default();
        assert_ne!(
            builder.build(Some("ns"), false, "f", &args()).unwrap(),
            builder.build(Some("ns"), false, "g", &args()).unwrap()
        );
    }

    #[test]
    fn test_raw_json_keys_are_readable() {
        let builder = KeyBuilder::new(false, Codec::Json);
        let key = builder.build(Some("ns"), false, "f", &args()).unwrap();
        assert_eq!(key.as_str(), r#"ns:f:[["7","north"],{"limit":"10"}]"#);
    }

    #[test]
    fn test_raw_bincode_keys_are_hex() {
        let builder = KeyBuilder::new(false, Codec::Bincode);
        let key = builder.build(None, false, "f", &args()).unwrap();
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, builder.build(None, false, "f", &args()).unwrap());
    }

    #[test]
    fn test_debug_arguments() {
        let builder = KeyBuilder::default();
        let key = builder
            .build(None, false, "f", &CallArgs::new().arg_debug(vec![1, 2]))
            .unwrap();
        assert_eq!(key.as_str(), digest("[1, 2]"));
    }

    #[test]
    fn test_namespace_pattern() {
        assert_eq!(namespace_pattern("orders"), "orders:*");
    }

    #[test]
    fn test_namespace_pattern_escapes_glob_characters() {
        let pattern = namespace_pattern("ord*");
        assert_eq!(pattern, "ord\\*:*");
        assert!(crate::store::glob_match(&pattern, "ord*:f:1"));
        assert!(!crate::store::glob_match(&pattern, "orders:f:1"));
    }
}
