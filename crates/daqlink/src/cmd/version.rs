use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("daqlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: daqlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("DAQLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "features: device={}, host={}, cli=true",
        cfg!(feature = "device"),
        cfg!(feature = "host")
    );
    println!("transports: named-pipe, tcp-socket");

    Ok(SUCCESS)
}
