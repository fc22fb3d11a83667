use std::io;
use std::sync::Arc;

use clap::Parser;

use crate::catalog::{CacheStore, Scanner};
use crate::playback::{
    DecoderGateway, DecoderRegistry, OutputDevice, PlaybackSession, RodioDevice,
};

mod cli;
mod commands;
mod event_loop;
mod logging;
mod playlist;
mod settings;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Args::parse();
    let mut settings = settings::load_settings(args.config.clone());
    args.apply(&mut settings);
    logging::init(&settings.log);

    tracing::info!(
        roots = ?settings.library.roots,
        incremental = args.incremental,
        "starting allegro"
    );

    let gateway: Arc<dyn DecoderGateway> = Arc::new(DecoderRegistry::with_defaults());
    let device: Arc<dyn OutputDevice> = Arc::new(RodioDevice::new());
    let session = PlaybackSession::new(gateway.clone(), device, &settings.audio);

    let store = CacheStore::from_settings(&settings.cache);
    tracing::debug!(path = %store.path().display(), "catalog cache");
    let mut scanner = Scanner::new(&settings.library, store, gateway);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut repl = event_loop::CommandLoop::new(&session, &mut scanner, &settings);
    repl.startup(args.incremental, &mut stdout)?;
    repl.run(stdin.lock(), &mut stdout)?;

    session.stop();
    session.close();
    Ok(())
}
