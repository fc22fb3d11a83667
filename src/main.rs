mod catalog;
mod config;
mod error;
mod playback;
mod runtime;

#[cfg(test)]
mod testing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
