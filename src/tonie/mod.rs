pub mod client;
pub mod model;
pub mod reconcile;

pub use client::{TonieClient, TonieHttpClient};
pub use model::{Chapter, CreativeTonie, Household};
pub use reconcile::{
    DesiredChapter, ReconcileSummary, plan_removals, plan_reorder, plan_uploads, reconcile,
};
