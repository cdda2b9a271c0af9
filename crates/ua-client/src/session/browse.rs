//! Managed browsing
//!
//! Browse results may be truncated; the server then issues a continuation
//! point which BrowseNext resumes. The managed variant follows the chain
//! until it runs dry, with a hard iteration bound, and guarantees that no
//! continuation point outlives the call: on error or when the bound trips,
//! outstanding points are explicitly released.

use super::Session;
use crate::error::{Error, Result};
use tracing::warn;
use ua_types::service::view::{BrowseDescription, ReferenceDescription};

/// Safety bound on BrowseNext rounds per managed browse.
const MAX_BROWSE_NEXT_ROUNDS: usize = 1000;

/// Aggregate result of a managed browse: all references of one starting
/// node, plus the final per-node status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManagedBrowseResult {
    pub status_code: ua_types::StatusCode,
    pub references: Vec<ReferenceDescription>,
}

impl Session {
    /// Browse with automatic continuation.
    ///
    /// References arrive concatenated in server order per node. The
    /// result vector matches `nodes_to_browse` positionally.
    pub async fn managed_browse(
        &self,
        nodes_to_browse: Vec<BrowseDescription>,
    ) -> Result<Vec<ManagedBrowseResult>> {
        let node_count = nodes_to_browse.len();
        let first = self.browse(nodes_to_browse, 0).await?;

        let mut results: Vec<ManagedBrowseResult> = first
            .iter()
            .map(|result| ManagedBrowseResult {
                status_code: result.status_code,
                references: result.references.clone(),
            })
            .collect();
        results.resize_with(node_count, ManagedBrowseResult::default);

        // Slots still awaiting continuation: (result index, point).
        let mut outstanding: Vec<(usize, Vec<u8>)> = first
            .into_iter()
            .enumerate()
            .filter(|(_, result)| !result.continuation_point.is_empty())
            .map(|(index, result)| (index, result.continuation_point))
            .collect();

        let mut rounds = 0;
        while !outstanding.is_empty() {
            rounds += 1;
            if rounds > MAX_BROWSE_NEXT_ROUNDS {
                self.release_points(&outstanding).await;
                return Err(Error::State(format!(
                    "browse did not converge within {MAX_BROWSE_NEXT_ROUNDS} continuation rounds"
                )));
            }

            let points: Vec<Vec<u8>> =
                outstanding.iter().map(|(_, point)| point.clone()).collect();
            let next = match self.browse_next(points, false).await {
                Ok(next) => next,
                Err(err) => {
                    // Never leak the continuation points the server still
                    // holds for us.
                    self.release_points(&outstanding).await;
                    return Err(err);
                }
            };

            let mut still_outstanding = Vec::new();
            for ((index, _), result) in outstanding.iter().zip(next.into_iter()) {
                let slot = &mut results[*index];
                slot.status_code = result.status_code;
                slot.references.extend(result.references);
                if !result.continuation_point.is_empty() {
                    still_outstanding.push((*index, result.continuation_point));
                }
            }
            outstanding = still_outstanding;
        }

        Ok(results)
    }

    async fn release_points(&self, outstanding: &[(usize, Vec<u8>)]) {
        let points: Vec<Vec<u8>> =
            outstanding.iter().map(|(_, point)| point.clone()).collect();
        if points.is_empty() {
            return;
        }
        if let Err(err) = self.browse_next(points, true).await {
            warn!(error = %err, "releasing continuation points failed");
        }
    }
}
