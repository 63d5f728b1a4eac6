//! Build-plan contribution intent

use crate::layer::LayerTypes;

/// Whether a plan entry wants the runtime at build time, launch time or both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contribution {
    pub build: bool,
    pub launch: bool,
}

impl Contribution {
    pub const BUILD: Self = Self {
        build: true,
        launch: false,
    };

    pub const LAUNCH: Self = Self {
        build: false,
        launch: true,
    };

    /// Read `build` / `launch` flags from plan entry metadata
    pub fn from_metadata(metadata: &toml::Table) -> Self {
        Self {
            build: is_build_contribution(metadata),
            launch: is_launch_contribution(metadata),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            build: self.build || other.build,
            launch: self.launch || other.launch,
        }
    }

    /// Build contributions are also cached between builds
    pub fn layer_types(self) -> LayerTypes {
        LayerTypes {
            build: self.build,
            cache: self.build,
            launch: self.launch,
        }
    }
}

pub fn is_build_contribution(metadata: &toml::Table) -> bool {
    flag(metadata, "build")
}

pub fn is_launch_contribution(metadata: &toml::Table) -> bool {
    flag(metadata, "launch")
}

fn flag(metadata: &toml::Table, key: &str) -> bool {
    metadata
        .get(key)
        .and_then(toml::Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(key: &str, value: toml::Value) -> toml::Table {
        let mut t = toml::Table::new();
        t.insert(key.to_string(), value);
        t
    }

    #[test]
    fn identifies_build_contribution() {
        assert!(is_build_contribution(&table("build", true.into())));
        assert!(!is_build_contribution(&table("launch", true.into())));
    }

    #[test]
    fn identifies_launch_contribution() {
        assert!(!is_launch_contribution(&table("build", true.into())));
        assert!(is_launch_contribution(&table("launch", true.into())));
    }

    #[test]
    fn non_boolean_flags_are_ignored() {
        assert!(!is_build_contribution(&table("build", "true".into())));
        assert_eq!(
            Contribution::from_metadata(&toml::Table::new()),
            Contribution::default()
        );
    }

    #[test]
    fn union_and_layer_types() {
        let both = Contribution::BUILD.union(Contribution::LAUNCH);
        assert_eq!(
            both.layer_types(),
            LayerTypes {
                build: true,
                cache: true,
                launch: true
            }
        );
        assert_eq!(
            Contribution::LAUNCH.layer_types(),
            LayerTypes {
                build: false,
                cache: false,
                launch: true
            }
        );
    }
}
