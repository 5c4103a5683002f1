use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and create tilepack level files.
#[derive(Parser, Debug)]
#[command(
    name = "tilepack",
    about = "Inspect and create tilepack level files",
    long_about = "Reads and writes the tagged binary level files used by the tile map editor.\n\n\
        EXAMPLES:\n\
          # Print the decoded value tree of a level\n\
          tilepack show level0\n\
        \n\
          # Create a 32x24 level on the 'cave' tileset\n\
          tilepack new level1 --width 32 --height 24 --tileset cave\n\
        \n\
          # Verify that a level re-encodes to the same bytes\n\
          tilepack check level0",
    version
)]
pub struct Args {
    /// TOML file with codec settings (`[codec]` table) and `tileset_dir`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory tileset images are resolved in. Overrides the config file.
    #[arg(long, global = true)]
    pub tileset_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the decoded value tree of a file.
    Show {
        file: PathBuf,

        /// Stop expanding containers below this depth.
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Write a new level with empty layers.
    New {
        file: PathBuf,

        #[arg(long, default_value = "16")]
        width: usize,

        #[arg(long, default_value = "16")]
        height: usize,

        #[arg(long, default_value = tilepack_level::DEFAULT_TILESET)]
        tileset: String,

        /// Replace the file if it exists.
        #[arg(long)]
        force: bool,
    },
    /// Decode a file, re-encode it and compare the bytes.
    Check { file: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_show_with_global_options() {
        let args = Args::parse_from([
            "tilepack",
            "show",
            "level0",
            "--depth",
            "2",
            "--tileset-dir",
            "assets",
        ]);
        assert_eq!(args.tileset_dir, Some(PathBuf::from("assets")));
        assert!(matches!(
            args.command,
            Command::Show { ref file, depth: Some(2) } if file == &PathBuf::from("level0")
        ));
    }

    #[test]
    fn new_has_editor_defaults() {
        let args = Args::parse_from(["tilepack", "new", "level3"]);
        match args.command {
            Command::New {
                width,
                height,
                tileset,
                force,
                ..
            } => {
                assert_eq!((width, height), (16, 16));
                assert_eq!(tileset, "blue");
                assert!(!force);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[rstest]
    #[case(&["tilepack", "new", "level0"], (16, 16))]
    #[case(&["tilepack", "new", "level0", "--width", "32", "--height", "24"], (32, 24))]
    #[case(&["tilepack", "new", "level0", "--height", "1"], (16, 1))]
    fn new_dimensions(#[case] argv: &[&str], #[case] expected: (usize, usize)) {
        let args = Args::parse_from(argv.iter().copied());
        match args.command {
            Command::New { width, height, .. } => assert_eq!((width, height), expected),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[rstest]
    #[case::no_command(&["tilepack"])]
    #[case::negative_width(&["tilepack", "new", "level0", "--width", "-1"])]
    #[case::missing_file(&["tilepack", "check"])]
    #[case::unknown_command(&["tilepack", "draw", "level0"])]
    fn rejects_bad_arguments(#[case] argv: &[&str]) {
        assert!(Args::try_parse_from(argv.iter().copied()).is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(Args::try_parse_from(["tilepack"]).is_err());
    }
}
