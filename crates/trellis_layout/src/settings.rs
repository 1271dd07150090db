// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layout selection stored as RON.

use crate::dag::{DagLayout, DagLayoutOptions};
use crate::error::Result;
use crate::force::{ForceLayout, ForceLayoutOptions};
use crate::hive::{HivePlotLayout, HivePlotOptions};
use crate::layout::GraphLayout;
use crate::multi_edge::{MultiEdgeForceLayout, MultiEdgeForceOptions};
use crate::simple::{SimpleLayout, SimpleLayoutOptions};
use serde::{Deserialize, Serialize};

/// Which layout to use, with its options.
///
/// ```ron
/// Dag((layering: simplex, orientation: leftToRight, collapseLinearChains: true))
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutSettings {
    /// Coordinates read from node properties
    Simple(SimpleLayoutOptions),
    /// Layered DAG layout
    Dag(DagLayoutOptions),
    /// Force-directed layout
    Force(ForceLayoutOptions),
    /// Hive plot
    Hive(HivePlotOptions),
    /// Force layout with fanned-out parallel edges
    MultiEdgeForce(MultiEdgeForceOptions),
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self::Dag(DagLayoutOptions::default())
    }
}

impl LayoutSettings {
    /// Parse from RON
    pub fn from_ron(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Name of the layout these settings build
    pub fn layout_name(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple",
            Self::Dag(_) => "dag",
            Self::Force(_) => "force",
            Self::Hive(_) => "hive",
            Self::MultiEdgeForce(_) => "multi-edge-force",
        }
    }

    /// Create the configured layout
    pub fn build(&self) -> Box<dyn GraphLayout> {
        match self {
            Self::Simple(options) => Box::new(SimpleLayout::new(options.clone())),
            Self::Dag(options) => Box::new(DagLayout::new(options.clone())),
            Self::Force(options) => Box::new(ForceLayout::new(options.clone())),
            Self::Hive(options) => Box::new(HivePlotLayout::new(options.clone())),
            Self::MultiEdgeForce(options) => Box::new(MultiEdgeForceLayout::new(options.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{Layering, Orientation};
    use crate::error::LayoutError;
    use crate::force::CollisionRadius;

    #[test]
    fn test_parse_partial_dag() {
        let settings = LayoutSettings::from_ron(
            "Dag((layering: simplex, orientation: leftToRight, collapseLinearChains: true))",
        )
        .unwrap();
        let LayoutSettings::Dag(options) = &settings else {
            panic!("expected dag settings");
        };
        assert_eq!(options.layering, Layering::Simplex);
        assert_eq!(options.orientation, Orientation::LeftToRight);
        assert!(options.collapse_linear_chains);
        assert!(options.center);
        assert_eq!(settings.build().name(), "dag");
    }

    #[test]
    fn test_round_trip() {
        let settings = LayoutSettings::Force(ForceLayoutOptions {
            link_distance: 55.0,
            collision_radius: Some(CollisionRadius::Fixed(8.0)),
            run_in_background: false,
            ..ForceLayoutOptions::default()
        });
        let text = settings.to_ron().unwrap();
        assert_eq!(LayoutSettings::from_ron(&text).unwrap(), settings);

        let simple = LayoutSettings::Simple(SimpleLayoutOptions::default());
        let text = simple.to_ron().unwrap();
        assert_eq!(LayoutSettings::from_ron(&text).unwrap(), simple);
    }

    #[test]
    fn test_demo_files_parse() {
        let dag = LayoutSettings::from_ron(include_str!("../../../demos/dag.ron")).unwrap();
        assert_eq!(dag.layout_name(), "dag");
        let LayoutSettings::Force(force) =
            LayoutSettings::from_ron(include_str!("../../../demos/force.ron")).unwrap()
        else {
            panic!("expected force settings");
        };
        assert_eq!(force.collision_radius, Some(CollisionRadius::Fixed(12.0)));
        assert_eq!(force.link_distance, 60.0);
    }

    #[test]
    fn test_default_and_errors() {
        assert_eq!(LayoutSettings::default().layout_name(), "dag");
        assert!(matches!(
            LayoutSettings::from_ron("Spiral(())"),
            Err(LayoutError::Settings(_))
        ));
        for settings in [
            LayoutSettings::Hive(HivePlotOptions::default()),
            LayoutSettings::MultiEdgeForce(MultiEdgeForceOptions::default()),
        ] {
            assert_eq!(settings.build().name(), settings.layout_name());
        }
    }
}
