//! calltrace CLI - コマンドラインインターフェース
//!
//! クラスパス上のプログラムを計装エージェント付きで実行し、呼び出しトレースを書き出す

use anyhow::Result;
use calltrace_core::{attach, AgentConfig, Interceptor};
use calltrace_ir::ClassAssembler;
use calltrace_recorder::LoadedClassLog;
use calltrace_vm::{ClassPath, Runtime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// calltrace - Runtime call trace recorder
#[derive(Parser)]
#[command(name = "calltrace")]
#[command(version = "0.1.0")]
#[command(about = "Records dynamic call graphs of programs running on the class runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program with the agent attached
    Run {
        /// Directories containing .cls files (searched in order)
        #[arg(short = 'c', long = "classpath", required = true)]
        class_path: Vec<PathBuf>,

        /// Agent options (e.g. srcClassPath=target/classes,testClassPath=target/test-classes)
        #[arg(short, long)]
        agent: Option<String>,

        /// Class whose static main is executed
        main_class: String,
    },

    /// Print the instrumented form of class files
    Dump {
        /// Agent options used to select the recording mode
        #[arg(short, long)]
        agent: String,

        /// Class files to instrument
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            class_path,
            agent,
            main_class,
        } => run(&class_path, agent.as_deref(), &main_class),
        Command::Dump { agent, files } => dump(&agent, &files),
    }
}

/// プログラムを実行する
///
/// エージェントのアタッチに失敗した場合は計装なしで実行を続けます。
fn run(class_path: &[PathBuf], agent: Option<&str>, main_class: &str) -> Result<()> {
    let mut classes = ClassPath::new();
    for dir in class_path {
        classes.add_directory(dir)?;
    }
    info!("{} classes on the class path", classes.len());
    let runtime = Runtime::new(classes);

    let handle = match agent {
        Some(options) => match attach(options, &runtime) {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("calltrace: agent not attached: {}", e);
                eprintln!("calltrace: running {} without instrumentation", main_class);
                None
            }
        },
        None => None,
    };

    let outcome = runtime.run_main(main_class);

    if let Some(handle) = handle {
        for path in handle.shutdown() {
            println!("Wrote {}", path.display());
        }
    }

    outcome.map_err(|e| anyhow::anyhow!("Exception in thread \"main\" {}", e))
}

/// クラスファイルを計装して表示する
fn dump(agent: &str, files: &[PathBuf]) -> Result<()> {
    let config = AgentConfig::parse(agent)?;
    let interceptor = Interceptor::from_config(&config, Arc::new(LoadedClassLog::new()));
    let assembler = ClassAssembler::new()?;

    for file in files {
        let src = std::fs::read_to_string(file)
            .map_err(|e| anyhow::anyhow!("Failed to read class file {:?}: {}", file, e))?;
        let classes = assembler
            .parse(&src)
            .map_err(|e| anyhow::anyhow!("Failed to parse class file {:?}: {}", file, e))?;

        for class in classes {
            match interceptor.instrument(&class) {
                Ok((rewritten, stats)) => {
                    println!(
                        "# {} members instrumented, {} skipped, {} hooks",
                        stats.members, stats.skipped, stats.hooks
                    );
                    print!("{}", rewritten);
                }
                Err(e) => {
                    println!("# not instrumented: {}", e);
                    print!("{}", class);
                }
            }
            println!();
        }
    }

    Ok(())
}
