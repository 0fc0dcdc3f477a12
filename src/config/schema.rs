//! Field schema for policy-chain configuration types
//!
//! `policy_config!` declares a configuration struct from a single field list
//! (`name: Type = internal_default`). From that list it derives:
//!
//! - the struct itself, every field wrapped in [`OptionalField`]
//!   (JSON keys are the field names, absent keys stay absent)
//! - `internal_defaults()`, the fully populated `Internal` snapshot
//! - the [`PolicyConfig`] merge/diff strategy and field-name table
//!
//! Adding a field therefore updates merge, diff, defaults and loading at once.
//!
//! [`OptionalField`]: crate::config::OptionalField
//! [`PolicyConfig`]: crate::config::PolicyConfig

macro_rules! policy_config {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                #[serde(skip_serializing_if = "crate::config::OptionalField::is_absent")]
                pub $field: crate::config::OptionalField<$ty>,
            )*
        }

        impl $name {
            /// Every field name, in declaration order
            pub const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Built-in defaults, one value for every field
            pub fn internal_defaults() -> Self {
                Self {
                    $($field: crate::config::OptionalField::some($default),)*
                }
            }
        }

        impl crate::config::PolicyConfig for $name {
            fn apply(target: &mut Self, source: &Self) -> bool {
                $(target.$field.merge_from(&source.$field);)*
                true
            }

            fn diff(old: &Self, new: &Self) -> crate::error::Result<Self> {
                Ok(Self {
                    $(
                        $field: crate::config::OptionalField::diff(&old.$field, &new.$field)
                            .map_err(|_| crate::error::AppError::InvariantViolation {
                                field: stringify!($field),
                            })?,
                    )*
                })
            }

            fn field_names() -> &'static [&'static str] {
                Self::FIELD_NAMES
            }

            fn present_fields(&self) -> Vec<&'static str> {
                let mut fields = Vec::new();
                $(
                    if self.$field.has_value() {
                        fields.push(stringify!($field));
                    }
                )*
                fields
            }
        }
    };
}

pub(crate) use policy_config;

#[cfg(test)]
mod tests {
    use crate::config::{OptionalField, PolicyConfig};
    use crate::error::AppError;

    policy_config! {
        struct Sample {
            /// Documented field
            enabled: bool = false,
            level: i32 = -3,
            label: String = "default".to_string(),
        }
    }

    #[test]
    fn test_field_table_matches_struct() {
        assert_eq!(Sample::field_names(), &["enabled", "level", "label"]);
        let defaults = Sample::internal_defaults();
        assert_eq!(defaults.present_fields(), Sample::field_names().to_vec());
        assert_eq!(defaults.label.get().map(String::as_str), Some("default"));
        assert!(Sample::default().is_empty());
    }

    #[test]
    fn test_apply_only_present_fields() {
        let mut target = Sample::internal_defaults();
        let source = Sample {
            level: OptionalField::some(9),
            ..Default::default()
        };
        assert!(Sample::apply(&mut target, &source));
        assert_eq!(target.level.copied(), Some(9));
        assert_eq!(target.enabled.copied(), Some(false));
    }

    #[test]
    fn test_every_field_participates_in_diff() {
        let old = Sample::internal_defaults();
        let new = Sample {
            enabled: true.into(),
            level: 4.into(),
            label: "custom".to_string().into(),
        };
        let diff = Sample::diff(&old, &new).unwrap();
        assert_eq!(diff.present_fields(), Sample::field_names().to_vec());
        assert!(Sample::diff(&new, &new).unwrap().is_empty());
    }

    #[test]
    fn test_diff_reports_regressed_field() {
        let old = Sample::internal_defaults();
        let mut new = old.clone();
        new.level.clear();
        let err = Sample::diff(&old, &new).unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation { field: "level" }));
    }

    #[test]
    fn test_json_keys_follow_field_names() {
        let sample: Sample = serde_json::from_str(r#"{"level": 12}"#).unwrap();
        assert_eq!(sample.present_fields(), vec!["level"]);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json, serde_json::json!({"level": 12}));
    }
}
