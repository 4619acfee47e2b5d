//! Deterministic collection names per (user, repository).

/// Collection name for a user's repository: `{user_id}_{sanitized}` where the
/// sanitized part keeps `[a-z0-9_-]` and starts with a letter or underscore.
///
/// Distinct repository names that sanitize identically (`my.repo` and
/// `my_repo`) share a collection.
#[must_use]
pub fn name_for(user_id: &str, repo_name: &str) -> String {
    format!("{user_id}_{}", sanitize(repo_name))
}

#[must_use]
pub fn sanitize(repo_name: &str) -> String {
    let mut out: String = repo_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out.to_ascii_lowercase()
}

/// Last path segment of a repository URL without a `.git` suffix.
#[must_use]
pub fn repo_name_from_url(repo_url: &str) -> String {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_owned()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(name_for("u1", "My.Repo Name"), "u1_my_repo_name");
        assert_eq!(name_for("u1", "terraform-aws"), "u1_terraform-aws");
    }

    #[test]
    fn prefixes_non_letter_start() {
        assert_eq!(name_for("u1", "9lives"), "u1__9lives");
        assert_eq!(name_for("u1", "-dash"), "u1__-dash");
        assert_eq!(name_for("u1", "_ok"), "u1__ok");
        assert_eq!(name_for("u1", ""), "u1__");
    }

    #[test]
    fn non_ascii_becomes_underscore() {
        assert_eq!(sanitize("café"), "caf_");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["My.Repo", "9lives", "a b c", "ok-name", "日本"] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "{raw}");
        }
    }

    #[test]
    fn accepted_collision() {
        assert_eq!(name_for("u1", "my.repo"), name_for("u1", "my_repo"));
    }

    #[test]
    fn repo_name_from_url_forms() {
        assert_eq!(repo_name_from_url("https://github.com/acme/infra"), "infra");
        assert_eq!(repo_name_from_url("https://github.com/acme/infra.git"), "infra");
        assert_eq!(repo_name_from_url("https://github.com/acme/infra/"), "infra");
        assert_eq!(repo_name_from_url("infra"), "infra");
    }

    proptest! {
        #[test]
        fn names_are_deterministic_and_well_formed(repo in "\\PC{0,40}") {
            let a = name_for("user42", &repo);
            let b = name_for("user42", &repo);
            prop_assert_eq!(&a, &b);

            let suffix = a.strip_prefix("user42_").unwrap();
            let mut chars = suffix.chars();
            let first = chars.next().unwrap();
            prop_assert!(first.is_ascii_lowercase() || first == '_');
            prop_assert!(chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
            prop_assert_eq!(suffix.to_ascii_lowercase(), suffix);
        }
    }
}
