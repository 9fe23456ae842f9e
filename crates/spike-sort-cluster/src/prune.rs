//! Empty-cluster pruning.

use spike_sort_core::{DenseResponsibilities, MixtureState};

/// Keep only components whose total responsibility mass exceeds
/// `min_mass`, dropping the rest from the state and the responsibility
/// matrix in lockstep.
///
/// Pure function: inputs are consumed and the surviving subset is returned
/// as fresh storage.
pub fn prune_empty_components(
    state: MixtureState,
    responsibilities: DenseResponsibilities,
    min_mass: f32,
) -> (MixtureState, DenseResponsibilities) {
    let masses = responsibilities.column_masses();
    let keep: Vec<usize> = masses
        .iter()
        .enumerate()
        .filter(|(_, &mass)| mass > min_mass)
        .map(|(k, _)| k)
        .collect();
    if keep.len() == state.n_components() {
        return (state, responsibilities);
    }
    let pruned_state = state.gather(&keep);
    let pruned_resp = responsibilities.retain_components(&keep);
    (pruned_state, pruned_resp)
}
