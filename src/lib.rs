//! Virtual fashion photoshoot studio.
//!
//! A garment photo is analysed once by [`analyzer::GarmentAnalyzer`]; the
//! resulting [`models::GarmentAnalysis`] then conditions every frame that
//! [`sequence::SequenceGenerator`] produces for a list of poses. Individual
//! frames can be edited afterwards with [`refiner::ImageRefiner`]. All provider
//! calls go through the shared [`retry::RetryPolicy`].

pub mod analyzer;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod presets;
pub mod refiner;
pub mod retry;
pub mod routes;
pub mod sequence;
pub mod store;

#[cfg(test)]
mod testing;
