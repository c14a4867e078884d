//! The shared wire contract.
//!
//! Every remote operation is described once, here, as a `static`
//! [`EndpointDescriptor`]. The client resolves URLs from the same descriptor
//! the server routes on, so the two sides cannot drift apart without a
//! rebuild. Peers that are not written in Rust embed the exported
//! [`ContractTable`] instead (see [`table`]).
//!
//! Templates use `{name}` placeholders, one per declared path parameter:
//!
//! ```rust
//! use stella::contract::{self, SAY};
//!
//! contract::validate().expect("contract is consistent");
//! assert_eq!(SAY.resolve(&["hello world"]).unwrap(), "/say/hello%20world");
//! ```

use std::borrow::Cow;
use std::collections::HashSet;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

use crate::codec::MediaType;
use crate::error::{ArgumentError, ContractError, Error};
use crate::method::Method;

/// Bumped whenever a path, parameter or header of any operation changes.
pub const VERSION: u32 = 1;

/// Header carrying the caller's identity.
///
/// Holds a plain username, not an RFC 7235 credential.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

pub const COMMAND_PATH_VARIABLE: &str = "command";

/// Content type of every request and response body.
pub const CONTENT_TYPE: MediaType = MediaType::TEXT_PLAIN;

/// `GET /say/{command}` → `"<identity> just said <command>"`.
pub static SAY: EndpointDescriptor = EndpointDescriptor {
    name: "say",
    method: Method::Get,
    path: "/say/{command}",
    path_params: &[COMMAND_PATH_VARIABLE],
    identity_header: Some(AUTHORIZATION_HEADER),
};

/// `GET /welcome` → `"Welcome <identity>"`.
pub static WELCOME: EndpointDescriptor = EndpointDescriptor {
    name: "welcome",
    method: Method::Get,
    path: "/welcome",
    path_params: &[],
    identity_header: Some(AUTHORIZATION_HEADER),
};

/// `GET /welcome-anonymous` → `"Are you a new member?"`.
pub static WELCOME_ANONYMOUS: EndpointDescriptor = EndpointDescriptor {
    name: "welcome-anonymous",
    method: Method::Get,
    path: "/welcome-anonymous",
    path_params: &[],
    identity_header: None,
};

/// Every operation of the contract, in declaration order.
pub static OPERATIONS: &[&EndpointDescriptor] = &[&SAY, &WELCOME, &WELCOME_ANONYMOUS];

// Everything but RFC 3986 unreserved characters is escaped, `/` included,
// so one argument always stays one path segment.
const PATH_SEGMENT: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

// ── EndpointDescriptor ────────────────────────────────────────────────────────

/// Shape of one remote operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct EndpointDescriptor {
    /// Stable operation name, used in logs and errors.
    pub name: &'static str,
    pub method: Method,
    /// URL template, e.g. `/say/{command}`.
    pub path: &'static str,
    /// Placeholder names in the order call sites pass their values.
    pub path_params: &'static [&'static str],
    /// Header carrying the caller identity. `None` for anonymous operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_header: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Part {
    Literal(&'static str),
    Placeholder(&'static str),
}

impl EndpointDescriptor {
    /// Placeholder names in template order.
    pub fn placeholders(&self) -> Result<Vec<&'static str>, ContractError> {
        Ok(self
            .parts()?
            .into_iter()
            .filter_map(|p| match p {
                Part::Placeholder(name) => Some(name),
                Part::Literal(_) => None,
            })
            .collect())
    }

    /// Checks the template against the declared path parameters.
    pub fn validate(&self) -> Result<(), ContractError> {
        let found = self.placeholders()?;

        let mut seen = HashSet::new();
        if let Some(dup) = found.iter().find(|name| !seen.insert(**name)) {
            return Err(ContractError::DuplicatePlaceholder {
                operation: self.name,
                name: (*dup).to_owned(),
            });
        }

        let declared: HashSet<_> = self.path_params.iter().copied().collect();
        if declared.len() != self.path_params.len() || declared != seen {
            return Err(ContractError::PlaceholderMismatch {
                operation: self.name,
                declared: self.path_params.to_vec(),
                found: found.iter().map(|s| (*s).to_owned()).collect(),
            });
        }

        Ok(())
    }

    pub fn requires_identity(&self) -> bool {
        self.identity_header.is_some()
    }

    /// Fails with [`ArgumentError::Arity`] unless exactly one value is given
    /// per declared path parameter.
    pub fn check_arity(&self, actual: usize) -> Result<(), ArgumentError> {
        if actual == self.path_params.len() {
            Ok(())
        } else {
            Err(ArgumentError::Arity {
                operation: self.name,
                expected: self.path_params.len(),
                actual,
            })
        }
    }

    /// Substitutes `args` (positional, matching [`path_params`](Self::path_params))
    /// into the template, path-escaping each value.
    pub fn resolve<S: AsRef<str>>(&self, args: &[S]) -> Result<String, Error> {
        self.check_arity(args.len())?;

        let mut path = String::with_capacity(self.path.len());
        for part in self.parts()? {
            match part {
                Part::Literal(text) => path.push_str(text),
                Part::Placeholder(name) => {
                    let index = self.param_index(name)?;
                    path.extend(utf8_percent_encode(args[index].as_ref(), PATH_SEGMENT));
                }
            }
        }
        Ok(path)
    }

    fn param_index(&self, name: &'static str) -> Result<usize, ContractError> {
        self.path_params
            .iter()
            .position(|p| *p == name)
            .ok_or_else(|| ContractError::PlaceholderMismatch {
                operation: self.name,
                declared: self.path_params.to_vec(),
                found: vec![name.to_owned()],
            })
    }

    fn parts(&self) -> Result<Vec<Part>, ContractError> {
        let template = self.path;
        let mut parts = Vec::new();
        let mut literal_start = 0;
        let mut open = None;

        for (i, c) in template.char_indices() {
            match (c, open) {
                ('{', None) => {
                    if literal_start < i {
                        parts.push(Part::Literal(&template[literal_start..i]));
                    }
                    open = Some(i);
                }
                ('}', Some(start)) => {
                    let name = &template[start + 1..i];
                    if !is_identifier(name) {
                        return Err(ContractError::InvalidPlaceholder {
                            operation: self.name,
                            name: name.to_owned(),
                        });
                    }
                    parts.push(Part::Placeholder(name));
                    open = None;
                    literal_start = i + 1;
                }
                ('{', Some(_)) | ('}', None) => {
                    return Err(ContractError::UnbalancedBrace {
                        operation: self.name,
                        position: i,
                    });
                }
                _ => {}
            }
        }

        if let Some(position) = open {
            return Err(ContractError::UnbalancedBrace { operation: self.name, position });
        }
        if literal_start < template.len() {
            parts.push(Part::Literal(&template[literal_start..]));
        }
        Ok(parts)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Percent-decodes one path segment captured by the router.
pub fn unescape(segment: &str) -> Result<String, std::str::Utf8Error> {
    percent_decode_str(segment).decode_utf8().map(Cow::into_owned)
}

// ── Whole-contract checks ─────────────────────────────────────────────────────

/// Validates every operation in [`OPERATIONS`].
///
/// Call once at startup; a broken contract should stop the process before the
/// first request, not at it.
pub fn validate() -> Result<(), ContractError> {
    validate_all(OPERATIONS)
}

/// Validates each descriptor, then checks names and routes are unique.
pub fn validate_all(operations: &[&EndpointDescriptor]) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for (i, op) in operations.iter().enumerate() {
        op.validate()?;

        if !names.insert(op.name) {
            return Err(ContractError::DuplicateOperation { operation: op.name });
        }
        if let Some(other) = operations[..i]
            .iter()
            .find(|o| o.method == op.method && o.path == op.path)
        {
            return Err(ContractError::DuplicateRoute {
                operation: op.name,
                other: other.name,
                method: op.method,
                path: op.path,
            });
        }
    }
    Ok(())
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Language-neutral snapshot of the contract.
#[derive(Debug, Serialize)]
pub struct ContractTable {
    pub version: u32,
    pub operations: Vec<EndpointDescriptor>,
}

impl ContractTable {
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// The current contract as a serializable table.
pub fn table() -> ContractTable {
    ContractTable {
        version: VERSION,
        operations: OPERATIONS.iter().map(|op| **op).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &'static str, path_params: &'static [&'static str]) -> EndpointDescriptor {
        EndpointDescriptor {
            name: "test",
            method: Method::Get,
            path,
            path_params,
            identity_header: None,
        }
    }

    #[test]
    fn builtin_contract_is_valid() {
        validate().unwrap();
        assert_eq!(SAY.placeholders().unwrap(), vec!["command"]);
        assert!(WELCOME.placeholders().unwrap().is_empty());
        assert!(SAY.requires_identity());
        assert!(!WELCOME_ANONYMOUS.requires_identity());
    }

    #[test]
    fn resolve_escapes_path_values() {
        assert_eq!(SAY.resolve(&["hello"]).unwrap(), "/say/hello");
        assert_eq!(SAY.resolve(&["hello world"]).unwrap(), "/say/hello%20world");
        assert_eq!(SAY.resolve(&["a/b?c#d"]).unwrap(), "/say/a%2Fb%3Fc%23d");
        assert_eq!(SAY.resolve(&["héllo"]).unwrap(), "/say/h%C3%A9llo");
        assert_eq!(SAY.resolve(&["safe-._~"]).unwrap(), "/say/safe-._~");
        assert_eq!(WELCOME.resolve::<&str>(&[]).unwrap(), "/welcome");
    }

    #[test]
    fn resolve_follows_declared_order() {
        let d = descriptor("/{b}/x/{a}", &["a", "b"]);
        assert_eq!(d.resolve(&["first", "second"]).unwrap(), "/second/x/first");
    }

    #[test]
    fn resolve_rejects_wrong_arity() {
        let err = SAY.resolve::<&str>(&[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Argument(ArgumentError::Arity { operation: "say", expected: 1, actual: 0 })
        ));
        assert!(WELCOME.resolve(&["extra"]).is_err());
    }

    #[test]
    fn unescape_inverts_escape() {
        let path = SAY.resolve(&["hello world/ü"]).unwrap();
        let segment = path.trim_start_matches("/say/");
        assert_eq!(unescape(segment).unwrap(), "hello world/ü");
        assert!(unescape("%ff").is_err());
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let err = descriptor("/say/{command}", &[]).validate().unwrap_err();
        assert!(matches!(err, ContractError::PlaceholderMismatch { .. }));

        let err = descriptor("/say", &["command"]).validate().unwrap_err();
        assert!(matches!(err, ContractError::PlaceholderMismatch { .. }));

        let err = descriptor("/say/{cmd}", &["command"]).validate().unwrap_err();
        assert!(matches!(err, ContractError::PlaceholderMismatch { .. }));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        let cases = [
            ("/say/{command", ContractError::UnbalancedBrace { operation: "test", position: 5 }),
            ("/say/command}", ContractError::UnbalancedBrace { operation: "test", position: 12 }),
            ("/say/{{command}}", ContractError::UnbalancedBrace { operation: "test", position: 6 }),
        ];
        for (path, expected) in cases {
            assert_eq!(descriptor(path, &["command"]).validate().unwrap_err(), expected);
        }

        let err = descriptor("/say/{9lives}", &["9lives"]).validate().unwrap_err();
        assert!(matches!(err, ContractError::InvalidPlaceholder { .. }));

        let err = descriptor("/{a}/{a}", &["a", "a"]).validate().unwrap_err();
        assert!(matches!(err, ContractError::DuplicatePlaceholder { .. }));
    }

    #[test]
    fn duplicate_operations_are_rejected() {
        static AGAIN: EndpointDescriptor = EndpointDescriptor {
            name: "again",
            method: Method::Get,
            path: "/welcome",
            path_params: &[],
            identity_header: None,
        };
        let err = validate_all(&[&WELCOME, &AGAIN]).unwrap_err();
        assert!(matches!(err, ContractError::DuplicateRoute { other: "welcome", .. }));

        let err = validate_all(&[&SAY, &SAY]).unwrap_err();
        assert_eq!(err, ContractError::DuplicateOperation { operation: "say" });
    }

    #[test]
    fn table_exports_every_template() {
        let toml = table().to_toml().unwrap();

        assert!(toml.contains("version = 1"));
        assert!(toml.contains(r#"path = "/say/{command}""#));
        assert!(toml.contains(r#"path_params = ["command"]"#));
        assert!(toml.contains(r#"identity_header = "Authorization""#));
        assert!(toml.contains(r#"path = "/welcome-anonymous""#));
        assert!(toml.contains(r#"method = "GET""#));
    }
}
