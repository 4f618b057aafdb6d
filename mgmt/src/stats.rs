// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Service metrics. Nothing is recorded unless the process installs a recorder.

use metrics::{counter, gauge};

pub(crate) fn rendered() {
    counter!("sfc_paths_rendered_total").increment(1);
}

pub(crate) fn failed(stage: &'static str) {
    counter!("sfc_path_render_failures_total", "stage" => stage).increment(1);
}

pub(crate) fn removed() {
    counter!("sfc_paths_removed_total").increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn chain_ids_in_use(count: usize) {
    gauge!("sfc_chain_ids_in_use").set(count as f64);
}
