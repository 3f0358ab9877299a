use anyhow::{anyhow, Result};
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

// [CONTAINER:]PATH
//
// container names follow what docker accepts for names and ids. paths
// can't hold a colon, so anything before the first one is the container.
const PATH_PATTERN: &str =
    r"^(?:(?P<container>[A-Za-z0-9][A-Za-z0-9_.\-]*):)?(?P<path>\.?(?:/?[\w\-.]*)+/?)$";

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PATH_PATTERN).expect("path pattern is valid"))
}

/// A path on the local filesystem, or inside a container when
/// `container` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pub container: Option<String>,
    pub path: String,
}

impl PathSpec {
    pub fn parse(s: &str) -> Result<Self> {
        let caps = path_regex()
            .captures(s)
            .ok_or_else(|| anyhow!("invalid path: {:?}", s))?;
        let path = caps.name("path").map_or("", |m| m.as_str());
        if path.is_empty() {
            return Err(anyhow!("invalid path: {:?}", s));
        }
        Ok(PathSpec {
            container: caps.name("container").map(|m| m.as_str().to_string()),
            path: path.to_string(),
        })
    }

    pub fn is_remote(&self) -> bool {
        self.container.is_some()
    }
}

impl FromStr for PathSpec {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathSpec::parse(s)
    }
}

impl Display for PathSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.container {
            Some(c) => write!(f, "{}:{}", c, self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Direction of a copy, with the container pulled out of whichever
/// side named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    FromContainer {
        container: String,
        src: String,
        dest: String,
    },
    ToContainer {
        container: String,
        src: String,
        dest: String,
    },
}

impl Transfer {
    pub fn new(src: PathSpec, dest: PathSpec) -> Result<Self> {
        match (src.container, dest.container) {
            (None, None) => Err(anyhow!("at least one of the paths should be in a container")),
            (Some(_), Some(_)) => Err(anyhow!("copying between containers is not allowed")),
            (Some(container), None) => Ok(Transfer::FromContainer {
                container,
                src: src.path,
                dest: dest.path,
            }),
            (None, Some(container)) => Ok(Transfer::ToContainer {
                container,
                src: src.path,
                dest: dest.path,
            }),
        }
    }

    pub fn container(&self) -> &str {
        match self {
            Transfer::FromContainer { container, .. } => container,
            Transfer::ToContainer { container, .. } => container,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(container: Option<&str>, path: &str) -> PathSpec {
        PathSpec {
            container: container.map(String::from),
            path: path.to_string(),
        }
    }

    #[test]
    fn parse_valid_paths() {
        assert_eq!(
            PathSpec::parse("web:/etc/hosts").unwrap(),
            spec(Some("web"), "/etc/hosts"),
            "container and absolute path"
        );
        assert_eq!(
            PathSpec::parse("3f2a9c:/var/log/").unwrap(),
            spec(Some("3f2a9c"), "/var/log/"),
            "container id, trailing slash"
        );
        assert_eq!(
            PathSpec::parse("my-app_1.db:data").unwrap(),
            spec(Some("my-app_1.db"), "data"),
            "docker name characters"
        );
        assert_eq!(PathSpec::parse("web:.").unwrap(), spec(Some("web"), "."), "container cwd");
        assert_eq!(
            PathSpec::parse("./rel/file.txt").unwrap(),
            spec(None, "./rel/file.txt"),
            "relative path"
        );
        assert_eq!(PathSpec::parse("dir/").unwrap(), spec(None, "dir/"), "trailing slash");
        assert_eq!(
            PathSpec::parse("/tmp/out").unwrap(),
            spec(None, "/tmp/out"),
            "absolute local path"
        );
    }

    #[test]
    fn parse_invalid_paths() {
        assert!(PathSpec::parse("").is_err(), "empty");
        assert!(PathSpec::parse("web:").is_err(), "container without path");
        assert!(PathSpec::parse("a:b:c").is_err(), "two colons");
        assert!(PathSpec::parse("my file.txt").is_err(), "spaces");
        assert!(PathSpec::parse(":/etc").is_err(), "empty container name");
        assert!(PathSpec::parse("-web:/etc").is_err(), "name starting with dash");
        assert!(PathSpec::parse("aé:/x").is_err(), "non-ascii container name");
    }

    #[test]
    fn parse_error_names_argument() {
        let err = PathSpec::parse("a:b:c").unwrap_err();
        assert_eq!(err.to_string(), "invalid path: \"a:b:c\"");
    }

    #[test]
    fn display_matches_input() {
        assert_eq!(PathSpec::parse("web:/etc").unwrap().to_string(), "web:/etc");
        assert_eq!(PathSpec::parse("out/").unwrap().to_string(), "out/");
    }

    #[test]
    fn transfer_direction() {
        let t = Transfer::new(spec(Some("web"), "/etc/hosts"), spec(None, "out")).unwrap();
        assert_eq!(
            t,
            Transfer::FromContainer {
                container: "web".into(),
                src: "/etc/hosts".into(),
                dest: "out".into(),
            }
        );
        assert_eq!(t.container(), "web");

        let t = Transfer::new(spec(None, "notes.txt"), spec(Some("db"), "/tmp")).unwrap();
        assert_eq!(
            t,
            Transfer::ToContainer {
                container: "db".into(),
                src: "notes.txt".into(),
                dest: "/tmp".into(),
            }
        );
        assert_eq!(t.container(), "db");
    }

    #[test]
    fn transfer_needs_exactly_one_container() {
        let err = Transfer::new(spec(None, "a"), spec(None, "b")).unwrap_err();
        assert_eq!(err.to_string(), "at least one of the paths should be in a container");

        let err = Transfer::new(spec(Some("a"), "/x"), spec(Some("b"), "/y")).unwrap_err();
        assert_eq!(err.to_string(), "copying between containers is not allowed");
    }
}
