use argh::FromArgs;
use log::{error, info};

use megacmd_updater::config::Config;
use megacmd_updater::executor::{Outcome, TransactionExecutor};
use megacmd_updater::fs_ops::RealFs;
use megacmd_updater::lock::LockHandle;

/// Check for, download, and install a new MEGAcmd release.
///
/// Exit status is inverted from the usual convention: `1` means an update
/// was installed, `0` covers "already up to date" and every failure. This
/// mirrors the source's own convention, which callers already depend on, so
/// it is kept rather than normalized to the usual "0 means success" rule.
#[derive(FromArgs, Debug)]
struct Args {
    /// stage the new version without installing it
    #[argh(switch)]
    do_not_install: bool,

    /// check the emergency update channel instead of the regular one
    #[argh(switch)]
    emergency_update: bool,

    /// run without acquiring the single-instance lock
    #[argh(switch)]
    skip_lock_check: bool,
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();

    std::process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let _lock = match LockHandle::acquire(args.skip_lock_check) {
        Ok(lock) => lock,
        Err(err) => {
            error!("{err}");
            return 0;
        }
    };

    let config = match Config::from_env(args.emergency_update) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return 0;
        }
    };

    let fs = RealFs;
    let mut executor = match TransactionExecutor::new(&config, &fs) {
        Ok(executor) => executor,
        Err(err) => {
            error!("{err}");
            return 0;
        }
    };

    match executor.run(args.do_not_install) {
        Ok(Outcome::Installed { version }) => {
            info!("installed version {version}");
            1
        }
        Ok(Outcome::Staged { version }) => {
            info!("staged version {version}, not installed");
            0
        }
        Ok(Outcome::UpToDate) => {
            info!("already up to date");
            0
        }
        Err(err) => {
            error!("update failed: {err}");
            0
        }
    }
}
