//! CSV export of the labeled projection.
//!
//! The exported table is the projected sample set in commit order:
//! `original_index,label,source_file,PC1..PCn`.

use std::fs;
use std::path::Path;

use crate::analysis::Projection;
use crate::error::Result;

/// Render the projection as CSV text.
pub fn projection_to_csv(projection: &Projection) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "original_index".to_string(),
        "label".to_string(),
        "source_file".to_string(),
    ];
    for d in 0..projection.dims {
        header.push(format!("PC{}", d + 1));
    }
    writer.write_record(&header)?;

    for point in &projection.points {
        let mut record = vec![
            point.index.to_string(),
            point.label.clone(),
            point.source.clone(),
        ];
        for &coord in &point.coords {
            record.push(coord.to_string());
        }
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    // csv::Writer only ever receives UTF-8 fields.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the projection CSV to `path`.
pub fn write_projection_csv(projection: &Projection, path: &Path) -> Result<()> {
    let csv = projection_to_csv(projection)?;
    fs::write(path, csv)?;
    log::info!(
        "Exported {} projected samples to {}",
        projection.points.len(),
        path.display()
    );
    Ok(())
}
