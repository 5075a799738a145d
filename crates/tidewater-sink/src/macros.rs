/// Generates `Display` and `FromStr` impls for simple string enums.
///
/// `str_enum!(Enum, norm, "msg", Variant => "canonical", "alias"...; ...)`
///
/// `Display` writes the canonical name; `FromStr` accepts the canonical
/// name or any alias after normalization. Parse failures are reported as
/// [`SinkError::ConfigurationError`](crate::error::SinkError).
///
/// # Normalization modes
///
/// - `lowercase_udash`: `trim().to_lowercase().replace('_', "-")`
macro_rules! str_enum {
    ($enum_name:ident, $norm:ident, $err_msg:literal,
        $( $variant:ident => $canonical:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $( Self::$variant => $canonical, )+
                };
                f.write_str(s)
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = crate::error::SinkError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = str_enum!(@normalize $norm s);
                match normalized.as_str() {
                    $( $canonical $(| $alias)* => Ok(Self::$variant), )+
                    other => Err(crate::error::SinkError::ConfigurationError(
                        format!("{}: '{}'", $err_msg, other),
                    )),
                }
            }
        }
    };

    (@normalize lowercase_udash $s:ident) => { $s.trim().to_lowercase().replace('_', "-") };
}
