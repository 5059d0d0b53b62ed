//! Renders a [`NetworkConfig`] into the files srsEPC and srsENB read.
//!
//! - `epc.conf`, `enb.conf`: INI-style process configs
//! - `enb.csv`: cell list (`pci,cell_id,tac,earfcndl,earfcnul,bandwidth`)
//! - `user_db.csv`: empty HSS subscriber store, header only
//! - `current_config.json`: the whole record, for inspection and reload
//!
//! The `render_*` functions are pure; [`write_all`] does the I/O.

use std::path::{Path, PathBuf};

use ltesim_common::models::NetworkConfig;
use ltesim_common::{Error, Result};

use crate::settings::Paths;

pub const CELL_CSV_HEADER: &str = "pci,cell_id,tac,earfcndl,earfcnul,bandwidth";
pub const USER_DB_HEADER: &str = "imsi,key,opc,amf,sqn";

/// Paths of everything [`write_all`] produced.
#[derive(Debug, Clone)]
pub struct RenderedFiles {
    pub epc_conf: PathBuf,
    pub enb_conf: PathBuf,
    pub cell_csv: PathBuf,
    pub user_db: PathBuf,
    pub config_json: PathBuf,
}

pub fn render_epc_conf(config: &NetworkConfig, paths: &Paths) -> String {
    format!(
        "#
# srsEPC configuration file
# Generated by ltesim-agent for {name} ({plmn})
#

[mme]
mme_code = 0x1a
mme_group = 0x0001
tac = {tac}
mcc = {mcc:03}
mnc = {mnc:02}
mme_bind_addr = {s1ap}
apn = srsapn
dns_addr = 8.8.8.8
encryption_algo = {cipher}
integrity_algo = {integrity}
paging_timer = {t3410}

[hss]
db_file = {user_db}
auth_algo = milenage

[spgw]
gtpu_bind_addr = {gtpu}
sgi_if_addr = 172.16.0.1
sgi_if_name = srs_spgw_sgi
max_paging_queue = 100

[pcrf]
bind_addr = 127.0.0.1

[log]
all_level = info
all_hex_limit = 32
filename = {log}
file_max_size = -1
",
        name = config.network_name,
        plmn = config.plmn_id,
        tac = config.tac,
        mcc = config.mcc,
        mnc = config.mnc,
        s1ap = config.interfaces.s1ap_bind_addr,
        cipher = config.security.ciphering_algorithm,
        integrity = config.security.integrity_algorithm,
        t3410 = config.timers.t3410,
        user_db = paths.user_db().display(),
        gtpu = config.interfaces.gtpu_bind_addr,
        log = paths.log_dir.join("epc.log").display(),
    )
}

pub fn render_enb_conf(config: &NetworkConfig, paths: &Paths, device_args: &str) -> String {
    format!(
        "#
# srsENB configuration file
# Generated by ltesim-agent for {name} ({plmn})
#

[enb]
enb_id = 0x19B
mcc = {mcc:03}
mnc = {mnc:02}
mme_addr = {mme}
gtp_bind_addr = {gtpu}
s1c_bind_addr = {s1ap}
n_prb = {n_prb}
tm = 1
nof_ports = 1

[enb_files]
sib_config = {sib}
rr_config  = {rr}
drb_config = {drb}

[rf]
device_name = uhd
device_args = {device_args}
tx_gain = {tx_gain}
rx_gain = {rx_gain}

[cell_list]
db_file = {cells}

[log]
all_level = info
all_hex_limit = 32
filename = {log}
file_max_size = -1

[gui]
enable = false
",
        name = config.network_name,
        plmn = config.plmn_id,
        mcc = config.mcc,
        mnc = config.mnc,
        mme = config.interfaces.mme_addr,
        gtpu = config.interfaces.gtpu_bind_addr,
        s1ap = config.interfaces.s1ap_bind_addr,
        n_prb = config.radio.n_prb,
        sib = paths.config_dir.join("sib.conf").display(),
        rr = paths.config_dir.join("rr.conf").display(),
        drb = paths.config_dir.join("drb.conf").display(),
        tx_gain = config.radio.tx_gain,
        rx_gain = config.radio.rx_gain,
        cells = paths.cell_csv().display(),
        log = paths.log_dir.join("enb.log").display(),
    )
}

/// Single-cell list; PCI is fixed at 1.
pub fn render_cell_csv(config: &NetworkConfig) -> String {
    format!(
        "{CELL_CSV_HEADER}\n1,{},{},{},{},{}\n",
        config.cell_id,
        config.tac,
        config.frequency.dl_earfcn,
        config.frequency.ul_earfcn,
        config.radio.bandwidth_mhz,
    )
}

pub fn render_user_db() -> String {
    format!("{USER_DB_HEADER}\n")
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(dir, e))
}

async fn write_file(path: PathBuf, contents: String) -> Result<PathBuf> {
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| Error::io(&path, e))?;
    tracing::debug!(path = %path.display(), "wrote config file");
    Ok(path)
}

/// Write every rendered file, creating the directories first.
///
/// Write failures are returned as [`Error::Io`]; nothing is retried.
pub async fn write_all(
    config: &NetworkConfig,
    paths: &Paths,
    device_args: &str,
) -> Result<RenderedFiles> {
    ensure_dir(&paths.config_dir).await?;
    ensure_dir(&paths.log_dir).await?;
    ensure_dir(&paths.data_dir).await?;

    let json = serde_json::to_string_pretty(config).map_err(|e| {
        Error::io(
            paths.current_config_json(),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;

    let files = RenderedFiles {
        epc_conf: write_file(paths.epc_conf(), render_epc_conf(config, paths)).await?,
        enb_conf: write_file(paths.enb_conf(), render_enb_conf(config, paths, device_args))
            .await?,
        cell_csv: write_file(paths.cell_csv(), render_cell_csv(config)).await?,
        user_db: write_file(paths.user_db(), render_user_db()).await?,
        config_json: write_file(paths.current_config_json(), json).await?,
    };

    tracing::info!(dir = %paths.config_dir.display(), "configuration rendered");
    Ok(files)
}

/// Load the last persisted configuration, if any.
pub async fn load_current(paths: &Paths) -> Result<Option<NetworkConfig>> {
    let path = paths.current_config_json();
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Error::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
