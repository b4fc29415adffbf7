extern crate scorchtools;

use log::info;
use std::env;

use scorchtools::r0v::{self, R0vError};

fn main() -> Result<(), R0vError> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        panic!("usage: {} path/image.r0v out.bmp", args[0]);
    }
    let r0v_path = &args[1];
    let bmp_path = &args[2];
    let r0v_data = std::fs::read(r0v_path)?;

    let image = r0v::decode(&r0v_data)?;
    info!("{}: {}x{}, {} bytes", r0v_path, image.width, image.height, r0v_data.len());
    image.to_bmp().save(bmp_path)?;
    Ok(())
}
