// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layout engine for Trellis.
//!
//! Every layout implements [`GraphLayout`] and reports through a shared
//! [`LayoutLifecycle`]: `Init`, then `Start`/`Calculating`, then `Done` or
//! `Error`. A [`GraphEngine`] owns one graph and one layout and decides when
//! the layout has to recompute.
//!
//! ## Layouts
//!
//! - [`SimpleLayout`]: coordinates taken from node properties
//! - [`DagLayout`]: layered Sugiyama layout with linear chain collapsing
//! - [`ForceLayout`]: force simulation, optionally on a worker thread
//! - [`HivePlotLayout`]: radial axes grouped by a node property
//! - [`MultiEdgeForceLayout`]: force layout with fanned-out parallel edges
//!
//! Layout choice and options can be stored as RON via [`LayoutSettings`].

pub mod dag;
pub mod engine;
pub mod error;
pub mod force;
pub mod hive;
pub mod layout;
pub mod lifecycle;
pub mod multi_edge;
pub mod props;
pub mod settings;
pub mod simple;
pub mod snapshot;

pub use dag::{ChainAnnotation, DagLayout, DagLayoutOptions};
pub use engine::{GraphEngine, VisibleEdge};
pub use error::{LayoutError, Result};
pub use force::{ForceLayout, ForceLayoutOptions};
pub use hive::{HivePlotLayout, HivePlotOptions};
pub use layout::{EdgePosition, GraphLayout, NodePosition, Point};
pub use lifecycle::{LayoutEvent, LayoutLifecycle, LayoutListener, LayoutListenerId, LayoutState};
pub use multi_edge::{MultiEdgeForceLayout, MultiEdgeForceOptions};
pub use props::{merge_props, PropChange};
pub use settings::LayoutSettings;
pub use simple::{SimpleLayout, SimpleLayoutOptions};
pub use snapshot::GraphSnapshot;
