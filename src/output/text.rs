//! Human-readable summary of a detection report.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::duplicates::{DetectionReport, Group, GroupDetail};

/// Plain-text renderer.
#[derive(Debug)]
pub struct TextOutput<'a> {
    report: &'a DetectionReport,
    scan_errors: usize,
}

impl<'a> TextOutput<'a> {
    /// Renderer for `report`; `scan_errors` counts entries the walk skipped.
    #[must_use]
    pub fn new(report: &'a DetectionReport, scan_errors: usize) -> Self {
        Self {
            report,
            scan_errors,
        }
    }

    /// Write every group followed by the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (index, group) in self.report.groups.iter().enumerate() {
            writeln!(writer, "Group {} {}", index + 1, describe(group))?;
            let keeper = group.suggested_keeper().map(|f| f.path.as_path());
            for file in &group.files {
                let marker = if Some(file.path.as_path()) == keeper {
                    '*'
                } else {
                    ' '
                };
                writeln!(
                    writer,
                    "  {marker} {} ({})",
                    file.path.display(),
                    ByteSize::b(file.size)
                )?;
            }
            writeln!(writer)?;
        }

        for failure in &self.report.unreadable {
            writeln!(writer, "unreadable: {failure}")?;
        }

        let summary = &self.report.summary;
        writeln!(
            writer,
            "{} mode: {} groups, {} duplicate files, {} reclaimable ({} files, {} unreadable, {} skipped) in {:.2?}",
            self.report.scan_mode,
            summary.group_count,
            summary.duplicate_files,
            ByteSize::b(summary.wasted_space),
            self.report.total_files,
            summary.unreadable_files,
            self.scan_errors,
            self.report.duration
        )
    }
}

fn describe(group: &Group) -> String {
    match &group.detail {
        GroupDetail::Single(detail) => match detail.avg_similarity() {
            Some(avg) => format!("[{}, avg {:.2}]", group.kind(), avg),
            None => format!("[{}]", group.kind()),
        },
        GroupDetail::MultiCriteria(merge) => {
            let criteria: Vec<&str> = merge.criteria_used.iter().map(|c| c.as_str()).collect();
            format!(
                "[{} via {}, confidence {:.2}]",
                merge.primary_criterion,
                criteria.join("+"),
                merge.confidence
            )
        }
    }
}
