//! Shape conversion between entities and DTOs
//!
//! Two named operations, matched on field names:
//!
//! - [`project`] lays the serialized source over `T::default()`. Target fields
//!   the source does not carry keep their zero value, and source fields the
//!   target does not declare are dropped.
//! - [`merge_onto`] decodes the source onto an existing target value. Source
//!   fields that are unset (`null` once serialized, or skipped) leave the
//!   target's current values untouched, which gives partial-update semantics.
//!
//! Both go through `serde_json::Value`, so any pair of `Serialize` /
//! `Deserialize` types works without per-type mapping code. Entity fields
//! skipped on serialization still need `#[serde(default)]` to load from a
//! store row that lacks them.
//!
//! ```rust
//! use crudbase::convert::{merge_onto, project};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! struct User { id: i64, name: String, status: String }
//!
//! #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
//! struct UserDto { id: i64, name: String, display_name: String }
//!
//! #[derive(Serialize)]
//! struct UpdateUser { name: Option<String>, status: Option<String> }
//!
//! let mut user = User { id: 7, name: "x".into(), status: "active".into() };
//! merge_onto(&UpdateUser { name: Some("y".into()), status: None }, &mut user).unwrap();
//! assert_eq!(user.status, "active");
//!
//! let dto: UserDto = project(&user).unwrap();
//! assert_eq!(dto, UserDto { id: 7, name: "y".into(), display_name: String::new() });
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure while reshaping one type into another
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The source could not be represented as JSON
    #[error("failed to encode {source_type}: {reason}")]
    Encode {
        source_type: &'static str,
        reason: String,
    },

    /// A field in the target has a type incompatible with the source value
    #[error("failed to decode into {target_type}: {reason}")]
    Decode {
        target_type: &'static str,
        reason: String,
    },

    /// Merging needs a struct-like (object) shape on both sides
    #[error("{type_name} is not a struct-like shape")]
    NotAnObject { type_name: &'static str },

    /// A filter field holds a value that cannot become a predicate
    #[error("filter field '{field}' has an unsupported value")]
    UnsupportedFilter { field: String },
}

impl ConversionError {
    fn encode<T: ?Sized>(err: &serde_json::Error) -> Self {
        Self::Encode {
            source_type: short_type_name::<T>(),
            reason: err.to_string(),
        }
    }

    fn decode<T: ?Sized>(err: &serde_json::Error) -> Self {
        Self::Decode {
            target_type: short_type_name::<T>(),
            reason: err.to_string(),
        }
    }
}

/// Last path segment of a type name, for messages and logs
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Serialize a value into a JSON value
pub(crate) fn to_value<S: Serialize + ?Sized>(source: &S) -> Result<Value, ConversionError> {
    serde_json::to_value(source).map_err(|e| ConversionError::encode::<S>(&e))
}

/// Serialize a value that must be struct-like into a JSON object
pub(crate) fn to_object<S: Serialize + ?Sized>(
    source: &S,
) -> Result<Map<String, Value>, ConversionError> {
    match to_value(source)? {
        Value::Object(map) => Ok(map),
        _ => Err(ConversionError::NotAnObject {
            type_name: short_type_name::<S>(),
        }),
    }
}

/// Deserialize a JSON value into the target type
pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ConversionError> {
    serde_json::from_value(value).map_err(|e| ConversionError::decode::<T>(&e))
}

/// Project `source` into a fresh `T`
///
/// The serialized source is laid over the serialized `T::default()`, so a
/// target field the source lacks (or holds as `null`) keeps its default.
/// Targets that are not struct-like are decoded from the source as is.
pub fn project<S, T>(source: &S) -> Result<T, ConversionError>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned + Default,
{
    match (to_value(&T::default())?, to_value(source)?) {
        (Value::Object(mut base), Value::Object(patch)) => {
            merge_maps(&mut base, patch);
            from_value(Value::Object(base))
        }
        (_, value) => from_value(value),
    }
}

/// Decode `source` onto `target`, keeping target fields the source leaves unset
///
/// Nested objects are merged recursively; arrays and scalars are replaced.
/// `target` is only modified when the whole merge succeeds.
pub fn merge_onto<S, T>(source: &S, target: &mut T) -> Result<(), ConversionError>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
{
    let patch = to_object(source)?;
    let mut base = to_object(target)?;
    merge_maps(&mut base, patch);
    *target = from_value(Value::Object(base))?;
    Ok(())
}

/// Decode `source` onto `T::default()`
pub fn hydrate<S, T>(source: &S) -> Result<T, ConversionError>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned + Default,
{
    let mut target = T::default();
    merge_onto(source, &mut target)?;
    Ok(target)
}

fn merge_maps(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Null => {}
            Value::Object(nested) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => merge_maps(existing, nested),
                _ => {
                    base.insert(key, Value::Object(nested));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    struct Address {
        city: String,
        zip: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    struct Account {
        id: i64,
        name: String,
        status: String,
        #[serde(skip_serializing, default)]
        password_hash: String,
        address: Address,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct AccountDto {
        id: i64,
        name: String,
        password_hash: String,
        nickname: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct AccountPatch {
        name: Option<String>,
        status: Option<String>,
        address: Option<AddressPatch>,
        unknown_field: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct AddressPatch {
        city: Option<String>,
        zip: Option<String>,
    }

    fn account() -> Account {
        Account {
            id: 3,
            name: "x".into(),
            status: "active".into(),
            password_hash: "secret".into(),
            address: Address {
                city: "Oslo".into(),
                zip: "0150".into(),
            },
        }
    }

    #[test]
    fn test_project_copies_common_fields_and_drops_non_serialized() {
        let dto: AccountDto = project(&account()).unwrap();
        assert_eq!(dto.id, 3);
        assert_eq!(dto.name, "x");
        // skip_serializing keeps the hash out of the intermediate form
        assert_eq!(dto.password_hash, "");
        assert_eq!(dto.nickname, None);
    }

    #[test]
    fn test_project_fills_fields_the_source_lacks() {
        #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
        struct Summary {
            name: String,
            address: Address,
            tags: Vec<String>,
        }

        let summary: Summary = project(&account()).unwrap();
        assert_eq!(summary.name, "x");
        assert_eq!(summary.address.city, "Oslo");
        assert!(summary.tags.is_empty());
    }

    #[test]
    fn test_project_null_keeps_default() {
        #[derive(Serialize)]
        struct Sparse {
            name: Option<String>,
            status: &'static str,
        }

        let dto: AccountDto = project(&Sparse {
            name: None,
            status: "x",
        })
        .unwrap();
        assert_eq!(dto.name, "");
        assert_eq!(dto.id, 0);
    }

    #[test]
    fn test_project_non_object_target() {
        let names: Vec<String> = project(&["a", "b"]).unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut target = account();
        let patch = AccountPatch {
            name: Some("y".into()),
            ..Default::default()
        };
        merge_onto(&patch, &mut target).unwrap();
        assert_eq!(target.name, "y");
        assert_eq!(target.status, "active");
        assert_eq!(target.address.city, "Oslo");
    }

    #[test]
    fn test_merge_nested_objects() {
        let mut target = account();
        let patch = AccountPatch {
            address: Some(AddressPatch {
                city: Some("Bergen".into()),
                zip: None,
            }),
            ..Default::default()
        };
        merge_onto(&patch, &mut target).unwrap();
        assert_eq!(target.address.city, "Bergen");
        assert_eq!(target.address.zip, "0150");
    }

    #[test]
    fn test_merge_type_mismatch_leaves_target_untouched() {
        #[derive(Serialize)]
        struct BadPatch {
            id: &'static str,
        }

        let mut target = account();
        let err = merge_onto(&BadPatch { id: "not-a-number" }, &mut target).unwrap_err();
        assert!(matches!(err, ConversionError::Decode { target_type: "Account", .. }));
        assert_eq!(target.id, 3);
    }

    #[test]
    fn test_merge_requires_object_shapes() {
        let mut target = account();
        let err = merge_onto(&42_i64, &mut target).unwrap_err();
        assert!(matches!(err, ConversionError::NotAnObject { .. }));
    }

    #[test]
    fn test_hydrate_starts_from_default() {
        let patch = AccountPatch {
            name: Some("fresh".into()),
            ..Default::default()
        };
        let hydrated: Account = hydrate(&patch).unwrap();
        assert_eq!(hydrated.name, "fresh");
        assert_eq!(hydrated.id, 0);
        assert_eq!(hydrated.status, "");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Account>(), "Account");
        assert_eq!(short_type_name::<Vec<Account>>(), "Vec");
    }
}
