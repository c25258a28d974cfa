//! Configuration resolution: compiled-in defaults overridable by environment
//! variables, matching the source's own override points one-for-one.

use crate::error::{Result, UpdaterError};
use crate::verify::PublicKey;

pub const UPDATE_FOLDER_NAME: &str = "eupdate";
pub const BACKUP_FOLDER_NAME: &str = "ebackup";
pub const VERSION_FILE_NAME: &str = "megacmd.version";

const DEFAULT_UPDATE_CHECK_URL: &str = "http://g.static.mega.co.nz/upd/mcmd/v.txt";
const DEFAULT_EMERGENCY_UPDATE_CHECK_URL: &str = "http://g.static.mega.co.nz/eupd/mcmd/v.txt";

const DEFAULT_UPDATE_PUBLIC_KEY: &str = "EACTzXPE8fdMhm6LizLe1FxV2DncybVh2cXpW3momTb8tpzRNT833r1RfySz5uHe8gdoXN1W0eM5Bk8X-LefygYYDS9RyXrRZ8qXrr9ITJ4r8ATnFIEThO5vqaCpGWTVi5pOPI5FUTJuhghVKTyAels2SpYT5CmfSQIkMKv7YVldaV7A-kY060GfrNg4--ETyIzhvaSZ_jyw-gmzYl_dwfT9kSzrrWy1vQG8JPNjKVPC4MCTZJx9SNvp1fVi77hhgT-Mc5PLcDIfjustlJkDBHtmGEjyaDnaWQf49rGq94q23mLc56MSjKpjOR1TtpsCY31d1Oy2fEXFgghM0R-1UkKswVuWhEEd8nO2PimJOl4u9ZJ2PWtJL1Ro0Hlw9OemJ12klIAxtGV-61Z60XoErbqThwWT5Uu3D2gjK9e6rL9dufSoqjC7UA2C0h7KNtfUcUHw0UWzahlR8XBNFXaLWx9Z8fRtA_a4seZcr0AhIA7JdQG5i8tOZo966KcFnkU77pfQTSprnJhCfEmYbWm9EZA122LJBWq2UrSQQN3pKc9goNaaNxy5PYU1yXyiAfMVsBDmDonhRWQh2XhdV-FWJ3rOGMe25zOwV4z1XkNBuW4T1JF2FgqGR6_q74B2ccFC8vrNGvlTEcs3MSxTI_EKLXQvBYy7hxG8EPUkrMVCaWzzTQAFEQ";

/// Resolved settings for one run of the updater. Every field here can be
/// overridden at construction time, so tests never touch the real
/// environment or home directory.
pub struct Config {
    pub public_key: PublicKey,
    pub manifest_url: String,
    pub app_dir: String,
    pub app_data_dir: String,
}

impl Config {
    /// Resolves configuration from the environment, following the override
    /// table: `MEGA_UPDATE_PUBLIC_KEY`, `MEGA_UPDATE_CHECK_URL`,
    /// `USE_UPDATE_TEST_FILE`, and `HOME`.
    pub fn from_env(emergency: bool) -> Result<Self> {
        let public_key_b64 =
            std::env::var("MEGA_UPDATE_PUBLIC_KEY").unwrap_or_else(|_| DEFAULT_UPDATE_PUBLIC_KEY.to_string());
        let public_key = PublicKey::from_base64(&public_key_b64)?;

        let mut manifest_url = std::env::var("MEGA_UPDATE_CHECK_URL").unwrap_or_else(|_| {
            if emergency {
                DEFAULT_EMERGENCY_UPDATE_CHECK_URL.to_string()
            } else {
                DEFAULT_UPDATE_CHECK_URL.to_string()
            }
        });
        if std::env::var_os("USE_UPDATE_TEST_FILE").is_some() {
            manifest_url = manifest_url.replace("v.txt", "vv.txt");
        }

        let app_dir = executable_dir()?;
        let app_data_dir = app_data_dir()?;

        Ok(Config { public_key, manifest_url, app_dir, app_data_dir })
    }

    pub fn update_dir(&self) -> String {
        format!("{}/{}", self.app_data_dir, UPDATE_FOLDER_NAME)
    }

    pub fn backup_dir(&self) -> String {
        format!("{}/{}", self.app_data_dir, BACKUP_FOLDER_NAME)
    }

    pub fn version_file(&self) -> String {
        format!("{}/{}", self.app_data_dir, VERSION_FILE_NAME)
    }
}

fn executable_dir() -> Result<String> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| std::path::Path::new("."));
    Ok(dir.to_string_lossy().into_owned())
}

/// The source's `getAppDataDir` reads `$HOME/.megaCmd/`; the historical
/// fallback below (a hardcoded uid `22` passwd lookup, rather than the
/// caller's own uid) looks like a bug, but it is load-bearing for fleets
/// that rely on it and is preserved verbatim rather than "fixed".
#[cfg(unix)]
fn app_data_dir() -> Result<String> {
    let home = match std::env::var("HOME") {
        Ok(h) if !h.is_empty() => h,
        _ => passwd_home_for_uid(22)?,
    };
    Ok(format!("{home}/.megaCmd"))
}

#[cfg(not(unix))]
fn app_data_dir() -> Result<String> {
    Ok(format!("{}/.megaCmd", executable_dir()?))
}

#[cfg(unix)]
fn passwd_home_for_uid(uid: libc::uid_t) -> Result<String> {
    let mut buf = vec![0 as libc::c_char; 16 * 1024];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
    if rc != 0 || result.is_null() {
        return Err(UpdaterError::Io(std::io::Error::last_os_error()));
    }

    let dir = unsafe { std::ffi::CStr::from_ptr(pwd.pw_dir) };
    Ok(dir.to_string_lossy().into_owned())
}
