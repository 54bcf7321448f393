use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;

use crate::convert::ProcessResult;

/// Statistics for the conversion run
#[derive(Debug, Default)]
pub struct RunStats {
    pub(crate) files_converted: usize,
    pub(crate) files_copied: usize,
    pub(crate) files_over_limit: usize,
    pub(crate) files_planned: usize,
    pub(crate) failed_inputs: Vec<PathBuf>,
    pub(crate) total_input_size: u64,
    pub(crate) total_output_size: u64,
    pub(crate) total_duration: Duration,
}

impl RunStats {
    pub(crate) fn add_result(&mut self, input: PathBuf, result: &ProcessResult, duration: Duration) {
        self.total_duration += duration;
        match result {
            ProcessResult::Converted { result, input_size } => {
                self.files_converted += 1;
                if !result.within_budget {
                    self.files_over_limit += 1;
                }
                self.total_input_size += input_size;
                self.total_output_size += result.output_size_bytes;
            }
            ProcessResult::Copied { result } => {
                self.files_copied += 1;
                self.total_input_size += result.output_size_bytes;
                self.total_output_size += result.output_size_bytes;
            }
            ProcessResult::Planned { .. } => {
                self.files_planned += 1;
            }
            ProcessResult::Failed { .. } => {
                self.failed_inputs.push(input);
            }
        }
    }

    pub(crate) fn files_failed(&self) -> usize {
        self.failed_inputs.len()
    }

    pub(crate) fn print_summary(&self) {
        println!("{}", "\n--- Conversion Summary ---".bold().magenta());
        println!("Files converted:        {}", self.files_converted);
        println!("Files copied:           {}", self.files_copied);
        if self.files_planned > 0 {
            println!("Files planned (dryrun): {}", self.files_planned);
        }
        if self.files_over_limit > 0 {
            println!("Over size limit:        {}", self.files_over_limit.to_string().yellow());
        }
        println!(
            "Files failed:           {}",
            if self.files_failed() > 0 {
                self.files_failed().to_string().red()
            } else {
                "0".normal()
            }
        );
        for input in &self.failed_inputs {
            println!("  - {}", discord_tools::path_to_string_relative(input));
        }

        if self.files_converted + self.files_copied > 0 {
            println!(
                "Total input size:       {}",
                discord_tools::format_size(self.total_input_size)
            );
            println!(
                "Total output size:      {}",
                discord_tools::format_size(self.total_output_size)
            );
        }

        println!(
            "Total time:             {}",
            discord_tools::format_duration(self.total_duration)
        );

        println!();
        if self.failed_inputs.is_empty() {
            println!("{}", "All videos converted successfully!".green().bold());
        } else {
            println!(
                "{}",
                format!("Finished with {} error(s).", self.files_failed()).red().bold()
            );
        }
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;

    use crate::convert::ConversionResult;

    fn converted(size: u64, within_budget: bool) -> ProcessResult {
        ProcessResult::Converted {
            result: ConversionResult {
                output_path: PathBuf::from("out.mp4"),
                output_size_bytes: size,
                within_budget,
            },
            input_size: 100_000_000,
        }
    }

    #[test]
    fn counts_each_outcome() {
        let mut stats = RunStats::default();
        let second = Duration::from_secs(1);

        stats.add_result(PathBuf::from("a.mkv"), &converted(9_000_000, true), second);
        stats.add_result(PathBuf::from("b.mkv"), &converted(10_800_000, false), second);
        stats.add_result(
            PathBuf::from("c.mp4"),
            &ProcessResult::Copied {
                result: ConversionResult {
                    output_path: PathBuf::from("c_discord.mp4"),
                    output_size_bytes: 5_000_000,
                    within_budget: true,
                },
            },
            second,
        );
        stats.add_result(
            PathBuf::from("d.avi"),
            &ProcessResult::Failed {
                error: "No video stream".to_string(),
            },
            second,
        );

        assert_eq!(stats.files_converted, 2);
        assert_eq!(stats.files_over_limit, 1);
        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.files_failed(), 1);
        assert_eq!(stats.failed_inputs, vec![PathBuf::from("d.avi")]);
        assert_eq!(stats.total_input_size, 205_000_000);
        assert_eq!(stats.total_output_size, 24_800_000);
        assert_eq!(stats.total_duration, Duration::from_secs(4));
    }
}
