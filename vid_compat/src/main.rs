use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use vid_compat::{run_auto, run_check, ConvertConfig, TargetProfile, VidCompatError};

#[derive(Parser)]
#[command(name = "vid-compat")]
#[command(version, about = "Playback compatibility analyzer and H.264/MP4 converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze and convert everything that is not direct-play ready
    #[command(name = "run")]
    Run {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, default_value_t = true)]
        recursive: bool,
        /// Overwrite existing outputs
        #[arg(short, long)]
        force: bool,
        /// Write per-file outcome records to this JSON file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Delete sources after a verified conversion
        #[arg(long)]
        delete_original: bool,
        /// Disable the hardware encode tier
        #[arg(long)]
        no_hw: bool,
        #[arg(long)]
        max_width: Option<u32>,
        #[arg(long)]
        max_height: Option<u32>,
        /// Accept files with embedded subtitle streams
        #[arg(long)]
        tolerate_subs: bool,
        #[arg(short, long)]
        verbose: bool,
    },

    /// Report compatibility without converting anything
    Check {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Print the strategy that would be chosen for one file
    Plan {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output,
            recursive,
            force,
            report,
            delete_original,
            no_hw,
            max_width,
            max_height,
            tolerate_subs,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            let _ = shared_utils::logging::init_logging(
                "vid_compat",
                shared_utils::logging::LogConfig::default().with_level(level),
            );

            shared_utils::require_all()?;

            let mut profile = TargetProfile::default();
            if let Some(w) = max_width {
                profile.max_width = w;
            }
            if let Some(h) = max_height {
                profile.max_height = h;
            }
            profile.tolerate_subtitles = tolerate_subs;

            let write_root = output.clone().unwrap_or_else(|| {
                if input.is_dir() {
                    input.clone()
                } else {
                    input
                        .parent()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| input.clone())
                }
            });
            if let Err(msg) = shared_utils::check_dangerous_directory(&write_root) {
                eprintln!("{}", msg);
                std::process::exit(1);
            }
            if delete_original {
                if let Err(msg) =
                    shared_utils::check_safe_for_destructive(&input, "delete originals of")
                {
                    eprintln!("{}", msg);
                    std::process::exit(1);
                }
            }

            let hw_encoder = if no_hw {
                info!("Hardware encoding disabled by flag, software libx264 only");
                None
            } else {
                shared_utils::HwAccel::detect().encoder.clone()
            };

            let cancel = shared_utils::CancelToken::new();
            shared_utils::install_ctrlc_handler(cancel.clone())?;

            let config = ConvertConfig {
                profile,
                output_dir: output,
                force,
                delete_original,
                hw_encoder,
                report_path: report,
            };

            match run_auto(&input, &config, &cancel, recursive) {
                Ok(_) => Ok(()),
                Err(VidCompatError::Cancelled) => {
                    eprintln!("Aborted by user");
                    std::process::exit(130);
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Check { input } => {
            let _ = shared_utils::logging::init_logging(
                "vid_compat",
                shared_utils::logging::LogConfig::default(),
            );
            shared_utils::require_tool("ffprobe")?;

            let (_, needs_fixing) = run_check(&input, &TargetProfile::default())?;
            if needs_fixing > 0 {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Plan { input } => {
            let _ = shared_utils::logging::init_logging(
                "vid_compat",
                shared_utils::logging::LogConfig::default(),
            );
            shared_utils::require_all()?;

            let profile = TargetProfile::default();
            let (desc, verdict) = vid_compat::inspect_file(&input, &profile)?;
            let hw = shared_utils::HwAccel::detect();
            let plan = shared_utils::build_plan(&desc, &verdict, &profile, hw.encoder.as_ref());

            println!("File: {}", input.display());
            println!("Container: {}", desc.format_name);
            if verdict.compatible {
                println!("Compatible: yes");
            } else {
                println!("Compatible: no");
                for issue in &verdict.issues {
                    println!("   ↳ {}", issue.detail);
                }
            }
            println!("Strategy: {}", plan.strategy.as_str());
            if let Some(ref enc) = plan.encoder {
                println!("Encoder: {} ({})", enc.name, enc.kind);
            }
            if let Some((w, h)) = plan.scale {
                println!("Scale: downscale into {}x{} (aspect preserved)", w, h);
            }
            println!(
                "Audio: {}",
                if plan.copy_audio { "copy" } else { "re-encode to aac" }
            );
            if plan.strip_subtitles {
                println!("Subtitles: stripped via stream mapping");
            }
            Ok(())
        }
    }
}
