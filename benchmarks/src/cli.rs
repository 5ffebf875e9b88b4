use primbench::device::{DeviceKind, DeviceSelection};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(DeviceSelection),
    Help,
}

pub fn print_usage() {
    eprintln!("Usage: benchmarks [OPTIONS]");
    eprintln!();
    eprintln!("  --device <kind>    Where kernels run: gpu, host (default: gpu)");
    eprintln!("  --backend <name>   GPU backend: vulkan, metal, dx12, gl, all (default: all)");
    eprintln!("  --adapter <n>      Index of the GPU adapter to use (default: best available)");
    eprintln!("  --help             Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG              Log filter for stderr (default: off)");
    eprintln!("  PRIMBENCH_KERNEL_DIR  Load kernel sources from this directory");
}

/// Parse the arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut selection = DeviceSelection::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--device" => {
                i += 1;
                selection.kind = match args.get(i).map(String::as_str) {
                    Some("gpu") => DeviceKind::Gpu,
                    Some("host") => DeviceKind::Host,
                    Some(other) => return Err(format!("Unknown device: {}", other)),
                    None => return Err("--device needs a value".to_string()),
                };
            }
            "--backend" => {
                i += 1;
                let name = args.get(i).ok_or("--backend needs a value")?;
                selection.backend = Some(name.clone());
            }
            "--adapter" => {
                i += 1;
                let value = args.get(i).ok_or("--adapter needs a value")?;
                let index = value
                    .parse()
                    .map_err(|_| format!("Invalid adapter index: {}", value))?;
                selection.adapter = Some(index);
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("Unknown flag: {}", other)),
        }
        i += 1;
    }
    Ok(Command::Run(selection))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_select_the_default_gpu() {
        assert_eq!(
            parse_args(&[]).unwrap(),
            Command::Run(DeviceSelection::default())
        );
    }

    #[test]
    fn device_selection_flags() {
        let cmd = parse_args(&args(&["--device", "host", "--backend", "vulkan", "--adapter", "1"]))
            .unwrap();
        assert_eq!(
            cmd,
            Command::Run(DeviceSelection {
                kind: DeviceKind::Host,
                backend: Some("vulkan".into()),
                adapter: Some(1),
            })
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse_args(&args(&["--rounds", "3"])).unwrap_err().contains("--rounds"));
        assert!(parse_args(&args(&["--device", "fpga"])).is_err());
        assert!(parse_args(&args(&["--adapter"])).is_err());
        assert!(parse_args(&args(&["--adapter", "first"])).is_err());
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Command::Help);
    }
}
