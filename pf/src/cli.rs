//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::FloorPlanOptions;

/// PlanForge - floor plans in, cleaning plans out
#[derive(Parser)]
#[command(
    name = "pf",
    about = "Generate structured cleaning plans from floor-plan documents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Generate a cleaning plan from one or more floor-plan documents
    Generate {
        /// Floor-plan files (image or PDF)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Example plan document to use as a template
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        options: AnalysisArgs,
    },

    /// Convert an existing cleaning plan into the standard shape
    Convert {
        /// The plan document to convert
        file: PathBuf,
    },

    /// Run the per-file pipeline over many floor plans
    Batch {
        /// Floor-plan files (image or PDF)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Template applied uniformly to all files
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        options: AnalysisArgs,
    },

    /// Inspect stored plans
    Plans {
        #[command(subcommand)]
        command: PlansCommand,
    },

    /// Manage the system prompt override
    Prompt {
        #[command(subcommand)]
        command: PromptCommand,
    },

    /// Manage provider API keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Manage provider tuning overrides
    Tuning {
        #[command(subcommand)]
        command: TuningCommand,
    },
}

/// Analysis flags shared by generate and batch
#[derive(Args)]
pub struct AnalysisArgs {
    /// The drawing has no room name labels
    #[arg(long)]
    pub no_room_names: bool,

    /// The drawing has no area figures
    #[arg(long)]
    pub no_area: bool,

    /// Reference object label for scale estimation
    #[arg(long)]
    pub reference_label: Option<String>,

    /// Reference object width for scale estimation
    #[arg(long)]
    pub reference_width: Option<f64>,

    /// Unit for the reference width
    #[arg(long, default_value = "m")]
    pub reference_unit: String,

    /// Plan category id (see `pf plans` docs)
    #[arg(long)]
    pub category: Option<String>,
}

impl AnalysisArgs {
    pub fn to_options(&self) -> FloorPlanOptions {
        FloorPlanOptions {
            has_room_names: !self.no_room_names,
            has_area: !self.no_area,
            reference_label: self.reference_label.clone(),
            reference_width: self.reference_width,
            reference_unit: self.reference_unit.clone(),
            plan_category: self.category.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum PlansCommand {
    /// List the most recent plans
    List {
        /// Number of plans to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one plan in full
    Show {
        /// Plan id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PromptCommand {
    /// Show the effective system prompt
    Show,

    /// Override the system prompt
    Set {
        /// The new prompt text
        text: String,
    },

    /// Reset to the built-in default
    Reset,
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// List configured keys (masked)
    List,

    /// Store a provider API key
    Set {
        /// Key name, e.g. gemini
        name: String,

        /// The secret value
        value: String,

        /// Display label
        #[arg(long)]
        label: Option<String>,
    },

    /// Delete a stored key
    Delete {
        /// Key name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum TuningCommand {
    /// Show the stored tuning override
    Show,

    /// Store a tuning override (unset fields use provider defaults)
    Set {
        /// Sampling temperature, 0..=2
        #[arg(long)]
        temperature: Option<f64>,

        /// Nucleus sampling threshold, 0..=1
        #[arg(long)]
        top_p: Option<f64>,

        /// Media resolution: low, medium, or high
        #[arg(long)]
        media_resolution: Option<String>,
    },

    /// Remove the tuning override
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::parse_from(["pf", "generate", "plan.png", "--no-area", "--category", "office"]);
        match cli.command {
            Command::Generate { files, template, options } => {
                assert_eq!(files, vec![PathBuf::from("plan.png")]);
                assert!(template.is_none());
                let options = options.to_options();
                assert!(!options.has_area);
                assert!(options.has_room_names);
                assert_eq!(options.plan_category.as_deref(), Some("office"));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_batch_with_template() {
        let cli = Cli::parse_from(["pf", "batch", "a.png", "b.png", "--template", "mal.pdf"]);
        match cli.command {
            Command::Batch { files, template, .. } => {
                assert_eq!(files.len(), 2);
                assert_eq!(template, Some(PathBuf::from("mal.pdf")));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_parse_keys_set() {
        let cli = Cli::parse_from(["pf", "keys", "set", "gemini", "sk-123", "--label", "Prod"]);
        match cli.command {
            Command::Keys {
                command: KeysCommand::Set { name, value, label },
            } => {
                assert_eq!(name, "gemini");
                assert_eq!(value, "sk-123");
                assert_eq!(label.as_deref(), Some("Prod"));
            }
            _ => panic!("expected keys set"),
        }
    }

    #[test]
    fn test_parse_reference_measurement() {
        let cli = Cli::parse_from([
            "pf",
            "generate",
            "plan.png",
            "--no-area",
            "--reference-label",
            "door",
            "--reference-width",
            "0.9",
        ]);
        match cli.command {
            Command::Generate { options, .. } => {
                let options = options.to_options();
                assert_eq!(options.reference_label.as_deref(), Some("door"));
                assert_eq!(options.reference_width, Some(0.9));
                assert_eq!(options.reference_unit, "m");
            }
            _ => panic!("expected generate"),
        }
    }
}
