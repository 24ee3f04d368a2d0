//! Shared macros for the backend crate.

/// Generate a `fmt::Debug` implementation that redacts sensitive fields.
///
/// - `show field_name` - prints the field value normally
/// - `redact field_name` - prints `"[REDACTED]"` instead of the value
/// - `redact_option field_name` - prints `Some("[REDACTED]")` or `None`
macro_rules! redacted_debug {
    ($name:ident { $( $kind:ident $field:ident ),* $(,)? }) => {
        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut s = f.debug_struct(stringify!($name));
                $( redacted_debug!(@add_field s, self, $kind, $field); )*
                s.finish_non_exhaustive()
            }
        }
    };
    (@add_field $s:ident, $self:ident, show, $field:ident) => {
        $s.field(stringify!($field), &$self.$field);
    };
    (@add_field $s:ident, $self:ident, redact, $field:ident) => {
        $s.field(stringify!($field), &"[REDACTED]");
    };
    (@add_field $s:ident, $self:ident, redact_option, $field:ident) => {
        $s.field(stringify!($field), &$self.$field.as_ref().map(|_| "[REDACTED]"));
    };
}

#[cfg(test)]
mod tests {
    #[allow(dead_code)]
    struct DbCredentials {
        pub user: String,
        pub password: String,
        pub url_override: Option<String>,
    }

    redacted_debug!(DbCredentials {
        show user,
        redact password,
        redact_option url_override,
    });

    #[test]
    fn test_redacted_debug_hides_password() {
        let creds = DbCredentials {
            user: "foodgram".to_string(),
            password: "pg-secret".to_string(),
            url_override: Some("postgres://foodgram:pg-secret@db/foodgram".to_string()),
        };
        let output = format!("{:?}", creds);
        assert!(output.contains("foodgram"));
        assert!(!output.contains("pg-secret"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn test_redacted_debug_option_none() {
        let creds = DbCredentials {
            user: "foodgram".to_string(),
            password: "hidden".to_string(),
            url_override: None,
        };
        let output = format!("{:?}", creds);
        assert!(output.contains("None"));
        assert!(!output.contains("hidden"));
    }
}
