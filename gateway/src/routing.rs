//! Path classification for the gateway.

/// Where a request path is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Exported API documentation files
    Docs,
    /// Forwarded to the API server
    Backend,
    Static,
    Media,
    /// Gateway status
    Health,
    /// Frontend build, falling back to `index.html`
    Frontend,
}

/// Prefix table, longest prefix first.
const PREFIXES: &[(&str, Target)] = &[
    ("/api/docs/", Target::Docs),
    ("/static/", Target::Static),
    ("/media/", Target::Media),
    ("/api/", Target::Backend),
];

pub fn classify(path: &str) -> Target {
    if path == "/health" {
        return Target::Health;
    }
    if path == "/api/docs" {
        return Target::Docs;
    }
    if path == "/api" {
        return Target::Backend;
    }
    PREFIXES
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix))
        .map_or(Target::Frontend, |(_, target)| *target)
}

/// Path to look up inside a file volume for `target`.
///
/// Docs URLs mirror the API server's (`/api/docs/redoc/`, `/api/docs/swagger/`)
/// and map onto the exported HTML files; the docs index is ReDoc.
pub fn volume_path(target: Target, path: &str) -> String {
    match target {
        Target::Docs => {
            let rest = path.trim_start_matches("/api/docs").trim_matches('/');
            match rest {
                "" | "redoc" => "/redoc.html".to_string(),
                "swagger" => "/swagger.html".to_string(),
                other => format!("/{other}"),
            }
        }
        Target::Static => strip(path, "/static"),
        Target::Media => strip(path, "/media"),
        _ => path.to_string(),
    }
}

fn strip(path: &str, prefix: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        let cases = [
            ("/api/docs/", Target::Docs),
            ("/api/docs/redoc/", Target::Docs),
            ("/api/docs", Target::Docs),
            ("/api/recipes/", Target::Backend),
            ("/api/schema/", Target::Backend),
            ("/admin/", Target::Frontend),
            ("/static/css/main.css", Target::Static),
            ("/media/recipes/a.png", Target::Media),
            ("/health", Target::Health),
            ("/", Target::Frontend),
            ("/recipes/12", Target::Frontend),
            ("/apiary", Target::Frontend),
            ("/mediafile", Target::Frontend),
        ];
        for (path, expected) in cases {
            assert_eq!(classify(path), expected, "{path}");
        }
    }

    #[test]
    fn test_volume_paths() {
        assert_eq!(volume_path(Target::Docs, "/api/docs/"), "/redoc.html");
        assert_eq!(volume_path(Target::Docs, "/api/docs/redoc/"), "/redoc.html");
        assert_eq!(volume_path(Target::Docs, "/api/docs/swagger/"), "/swagger.html");
        assert_eq!(volume_path(Target::Docs, "/api/docs/openapi.json"), "/openapi.json");
        assert_eq!(volume_path(Target::Static, "/static/js/app.js"), "/js/app.js");
        assert_eq!(volume_path(Target::Media, "/media/recipes/a.png"), "/recipes/a.png");
        assert_eq!(volume_path(Target::Frontend, "/signin"), "/signin");
    }
}
