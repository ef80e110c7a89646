/*!
 * Word timing reconciliation.
 */

pub mod reconciler;

pub use reconciler::{
    BoundaryOrigin, RawBoundaryEvent, ReconciledTimeline, ReconcilerConfig, TimingReconciler,
    WordBoundary, ZeroBoundaryPolicy,
};
