pub mod features;
pub mod ids;
pub mod track;

pub use features::{FeatureComponents, FeatureVector, TrackRecord};
pub use ids::{PlaylistId, TrackId};
pub use track::{GenreTag, Track};
