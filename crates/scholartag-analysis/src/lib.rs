//! Analysis layer: label string → tidy tag table → counts, incidence, clustering, dendrogram.

pub mod aggregate;
pub mod cluster;
pub mod dendrogram;
pub mod tidy;

pub use aggregate::{IncidenceMatrix, TagCount, tag_frequencies};
pub use cluster::{Dendrogram, DistanceMatrix, Merge, Node, binary_distances, ward_linkage};
pub use dendrogram::{RenderOptions, render_svg, render_text, truncate_label};
pub use tidy::{LabelPolicy, TidyOptions, tidy_tags};
