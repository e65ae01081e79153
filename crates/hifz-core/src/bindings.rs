//! TypeScript definitions for the UI-facing types.

use crate::engine::{EntryView, Notice, PlayerSnapshot, WordView};
use crate::error::{LoadFailureKind, MediaFailure, PlaybackError};
use crate::queue::ScopeKind;
use crate::segment::TimeSegment;
use crate::transport::TransportState;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Replace every `.ts` file in `out_dir` with freshly generated bindings.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<PlayerSnapshot>(out_dir)?;
    export_single_type::<EntryView>(out_dir)?;
    export_single_type::<WordView>(out_dir)?;
    export_single_type::<Notice>(out_dir)?;
    export_single_type::<PlaybackError>(out_dir)?;
    export_single_type::<LoadFailureKind>(out_dir)?;
    export_single_type::<MediaFailure>(out_dir)?;
    export_single_type::<TransportState>(out_dir)?;
    export_single_type::<ScopeKind>(out_dir)?;
    export_single_type::<TimeSegment>(out_dir)?;
    Ok(())
}
