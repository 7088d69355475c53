//! Command-line argument parsing for storemon

/// Parse command line arguments
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub input: Option<String>,
    pub workers: Option<usize>,
    pub validate: bool,
    pub help: bool,
    /// Values that were given but could not be used
    pub errors: Vec<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse an argv-style list (first element is the program name)
pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.input = Some(args[i].clone());
                }
            }
            "--workers" => {
                if i + 1 < args.len() {
                    i += 1;
                    match args[i].trim().parse() {
                        Ok(n) => result.workers = Some(n),
                        Err(_) => result.errors.push(format!(
                            "--workers expects a positive integer, got '{}'",
                            args[i]
                        )),
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("storemon - Store uptime report\n");
    println!("USAGE:");
    println!("    storemon [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --input, -i PATH        Dataset snapshot (JSON); defaults to STOREMON_DATA_PATH");
    println!("    --workers N             Concurrent store computations (default: STOREMON_WORKERS)");
    println!("    --validate              Validate configuration and exit");
    println!("    --help, -h              Show this help message\n");
    println!("OUTPUT:");
    println!("    One JSON object per store on stdout, in store id order");
    println!("\nENVIRONMENT:");
    println!("    STOREMON_DEFAULT_TIMEZONE, STOREMON_WORKERS, STOREMON_DATA_PATH");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(list: &[&str]) -> Vec<String> {
        std::iter::once("storemon")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args_default() {
        let result = parse_args_from(&argv(&[]));
        assert_eq!(result, Args::default());
    }

    #[test]
    fn test_parse_args_validate() {
        let result = parse_args_from(&argv(&["--validate"]));
        assert!(result.validate);
        assert!(!result.help);
    }

    #[test]
    fn test_parse_args_help() {
        assert!(parse_args_from(&argv(&["--help"])).help);
        assert!(parse_args_from(&argv(&["-h"])).help);
    }

    #[test]
    fn test_parse_args_input() {
        let result = parse_args_from(&argv(&["--input", "data.json"]));
        assert_eq!(result.input, Some("data.json".to_string()));

        let result = parse_args_from(&argv(&["-i", "other.json"]));
        assert_eq!(result.input, Some("other.json".to_string()));
    }

    #[test]
    fn test_parse_args_input_missing_value() {
        let result = parse_args_from(&argv(&["--input"]));
        assert_eq!(result.input, None);
    }

    #[test]
    fn test_parse_args_workers() {
        assert_eq!(parse_args_from(&argv(&["--workers", "3"])).workers, Some(3));
    }

    #[test]
    fn test_parse_args_bad_workers_is_reported() {
        let result = parse_args_from(&argv(&["--workers", "many"]));
        assert_eq!(result.workers, None);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("many"), "error should echo the value: {:?}", result.errors);

        let result = parse_args_from(&argv(&["--workers", "-3"]));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_parse_args_multiple_flags() {
        let result = parse_args_from(&argv(&["--workers", "2", "--input", "d.json", "--validate"]));
        assert_eq!(result.workers, Some(2));
        assert_eq!(result.input, Some("d.json".to_string()));
        assert!(result.validate);
    }

    #[test]
    fn test_unknown_flags_ignored() {
        let result = parse_args_from(&argv(&["--verbose", "--once"]));
        assert_eq!(result, Args::default());
    }
}
