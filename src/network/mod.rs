use std::fmt;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Mode, Profile};
use crate::error::{ApplyError, Field, ValidationError};
use crate::validate::{self, parse_ipv4};

/// 静态地址的网关跃点数
const GATEWAY_METRIC: &str = "1";
/// 无法枚举网卡时的默认值
const FALLBACK_ADAPTER: &str = "Ethernet";

/// 一条 netsh 调用（不含程序名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetshCommand {
    args: Vec<String>,
}

impl NetshCommand {
    pub const PROGRAM: &'static str = "netsh";

    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn set_address_static(adapter: &str, address: &str, mask: &str, gateway: Option<&str>) -> Self {
        let mut cmd = Self::new(["interface", "ip", "set", "address", adapter, "static", address, mask]);
        if let Some(gw) = gateway {
            cmd.args.push(gw.to_string());
            cmd.args.push(GATEWAY_METRIC.to_string());
        }
        cmd
    }

    pub fn set_address_dhcp(adapter: &str) -> Self {
        Self::new(["interface", "ip", "set", "address", adapter, "dhcp"])
    }

    pub fn set_dns_static(adapter: &str, dns: &str) -> Self {
        Self::new(["interface", "ip", "set", "dns", adapter, "static", dns])
    }

    pub fn set_dns_dhcp(adapter: &str) -> Self {
        Self::new(["interface", "ip", "set", "dns", adapter, "dhcp"])
    }

    pub fn show_interfaces() -> Self {
        Self::new(["interface", "show", "interface"])
    }

    pub fn show_config(adapter: &str) -> Self {
        Self::new(["interface", "ip", "show", "config", adapter])
    }
}

impl fmt::Display for NetshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::PROGRAM)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// 命令执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// 执行 netsh 的抽象，便于替换平台实现和测试
pub trait CommandRunner {
    fn run(&self, command: &NetshCommand) -> Result<CommandOutput, ApplyError>;
}

/// 直接调用系统 netsh
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &NetshCommand) -> Result<CommandOutput, ApplyError> {
        let mut cmd = Command::new(NetshCommand::PROGRAM);
        cmd.args(command.args());

        // 避免 GUI 进程调用时弹出控制台窗口
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output().map_err(|source| ApplyError::Spawn {
            program: NetshCommand::PROGRAM.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// 网卡当前的 IP 配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterSnapshot {
    pub dhcp: bool,
    pub address: Option<String>,
    pub subnet_mask: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Vec<String>,
}

impl AdapterSnapshot {
    /// 以当前配置生成一个新配置（只取第一个 DNS）
    pub fn to_profile(&self, name: &str, adapter: &str) -> Profile {
        if self.dhcp {
            return Profile::dhcp(name, adapter);
        }
        Profile {
            name: name.to_string(),
            adapter: adapter.to_string(),
            mode: Mode::Static,
            address: self.address.clone(),
            subnet_mask: self.subnet_mask.clone(),
            gateway: self.gateway.clone(),
            dns: self.dns_servers.first().cloned(),
        }
    }
}

/// netsh 前端：枚举网卡、读取和应用配置
#[derive(Debug, Clone, Default)]
pub struct Netsh<R = SystemRunner> {
    runner: R,
}

impl Netsh<SystemRunner> {
    pub fn system() -> Self {
        Self { runner: SystemRunner }
    }
}

impl<R: CommandRunner> Netsh<R> {
    #[cfg(test)]
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// 获取网卡名称列表（保留空格）
    pub fn list_adapters(&self) -> Vec<String> {
        let adapters = match self.run_checked(&NetshCommand::show_interfaces()) {
            Ok(stdout) => parse_interface_table(&stdout),
            Err(e) => {
                warn!("Listing adapters failed: {}", e);
                Vec::new()
            }
        };

        if adapters.is_empty() {
            vec![FALLBACK_ADAPTER.to_string()]
        } else {
            adapters
        }
    }

    /// 读取网卡当前配置
    pub fn current_config(&self, adapter: &str) -> Option<AdapterSnapshot> {
        match self.run_checked(&NetshCommand::show_config(adapter)) {
            Ok(stdout) => parse_show_config(&stdout),
            Err(e) => {
                debug!("Reading config of {:?} failed: {}", adapter, e);
                None
            }
        }
    }

    /// 应用配置到指定网卡；命令依次执行，遇到第一个失败即停止
    pub fn apply(&self, profile: &Profile, adapter: &str) -> Result<(), ApplyError> {
        let commands = commands_for(profile, adapter)?;
        info!("Applying profile {:?} to {:?}", profile.name, adapter);

        for command in &commands {
            if let Err(e) = self.run_checked(command) {
                warn!("Applying {:?} failed: {}", profile.name, e);
                return Err(e);
            }
        }

        info!("Applied profile {:?} to {:?}", profile.name, adapter);
        Ok(())
    }

    fn run_checked(&self, command: &NetshCommand) -> Result<String, ApplyError> {
        debug!("Running {}", command);
        let output = self.runner.run(command)?;
        if output.success {
            return Ok(output.stdout);
        }

        // netsh 常把错误写到 stdout
        let text = if output.stderr.trim().is_empty() {
            output.stdout
        } else {
            output.stderr
        };
        Err(ApplyError::Failed {
            command: command.to_string(),
            code: output.code,
            output: text.trim().to_string(),
        })
    }
}

/// 生成应用配置所需的命令序列
pub fn commands_for(profile: &Profile, adapter: &str) -> Result<Vec<NetshCommand>, ApplyError> {
    let adapter = adapter.trim();
    if adapter.is_empty() {
        return Err(ApplyError::NoAdapter);
    }
    validate::validate(profile)?;

    if profile.mode == Mode::Dhcp {
        return Ok(vec![
            NetshCommand::set_address_dhcp(adapter),
            NetshCommand::set_dns_dhcp(adapter),
        ]);
    }

    // 校验通过后各字段都能解析，这里统一输出规范写法
    let canonical = |v: Option<&str>| v.and_then(parse_ipv4).map(|ip| ip.to_string());
    let address = canonical(profile.address.as_deref())
        .ok_or(ValidationError::Missing { field: Field::Address })?;
    let mask = canonical(profile.subnet_mask.as_deref())
        .ok_or(ValidationError::Missing { field: Field::SubnetMask })?;
    let gateway = canonical(profile.gateway.as_deref());

    let mut commands = vec![NetshCommand::set_address_static(
        adapter,
        &address,
        &mask,
        gateway.as_deref(),
    )];
    if let Some(dns) = canonical(profile.dns.as_deref()) {
        commands.push(NetshCommand::set_dns_static(adapter, &dns));
    }
    Ok(commands)
}

/// 解析 `netsh interface show interface` 的输出
///
/// 分隔线之后每行为：管理状态 状态 类型 接口名称（名称可含空格）
pub fn parse_interface_table(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 || cols[2].eq_ignore_ascii_case("loopback") {
                return None;
            }
            Some(cols[3..].join(" "))
        })
        .collect()
}

/// 解析 `netsh interface ip show config <adapter>` 的输出
pub fn parse_show_config(output: &str) -> Option<AdapterSnapshot> {
    let mut snapshot = AdapterSnapshot::default();
    let mut seen_dhcp = false;
    let mut in_dns = false;

    for line in output.lines() {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // 续行（如第二个 DNS）缩进远大于键所在的行
        if indent > 8 {
            if in_dns {
                push_dns(&mut snapshot, trimmed);
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            in_dns = false;
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        in_dns = false;

        if key == "dhcp enabled" {
            seen_dhcp = true;
            snapshot.dhcp = value.eq_ignore_ascii_case("yes");
        } else if key == "ip address" {
            if snapshot.address.is_none() {
                snapshot.address = parse_ipv4(value).map(|ip| ip.to_string());
            }
        } else if key == "subnet prefix" {
            if snapshot.subnet_mask.is_none() {
                snapshot.subnet_mask = value
                    .split_once("(mask ")
                    .and_then(|(_, rest)| rest.split_once(')'))
                    .and_then(|(mask, _)| parse_ipv4(mask.trim()))
                    .map(|ip| ip.to_string());
            }
        } else if key == "default gateway" {
            if snapshot.gateway.is_none() {
                snapshot.gateway = parse_ipv4(value).map(|ip| ip.to_string());
            }
        } else if key.contains("dns servers") {
            in_dns = true;
            push_dns(&mut snapshot, value);
        }
    }

    seen_dhcp.then_some(snapshot)
}

fn push_dns(snapshot: &mut AdapterSnapshot, value: &str) {
    if let Some(ip) = parse_ipv4(value) {
        let ip = ip.to_string();
        if !snapshot.dns_servers.contains(&ip) {
            snapshot.dns_servers.push(ip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// 记录所有命令，可按序号让某条命令失败
    #[derive(Default)]
    struct RecordingRunner {
        commands: RefCell<Vec<NetshCommand>>,
        fail_at: Option<usize>,
        stdout: String,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &NetshCommand) -> Result<CommandOutput, ApplyError> {
            let mut commands = self.commands.borrow_mut();
            let idx = commands.len();
            commands.push(command.clone());
            if self.fail_at == Some(idx) {
                return Ok(CommandOutput {
                    success: false,
                    code: Some(1),
                    stdout: "The requested operation requires elevation (Run as administrator).\r\n"
                        .to_string(),
                    stderr: String::new(),
                });
            }
            Ok(CommandOutput {
                success: true,
                code: Some(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    struct MissingTool;

    impl CommandRunner for MissingTool {
        fn run(&self, _command: &NetshCommand) -> Result<CommandOutput, ApplyError> {
            Err(ApplyError::Spawn {
                program: NetshCommand::PROGRAM.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn office() -> Profile {
        Profile {
            name: "Office".to_string(),
            adapter: "Ethernet".to_string(),
            mode: Mode::Static,
            address: Some("192.168.1.50".to_string()),
            subnet_mask: Some("255.255.255.0".to_string()),
            gateway: Some("192.168.1.1".to_string()),
            dns: None,
        }
    }

    const SHOW_INTERFACE: &str = "
Admin State    State          Type             Interface Name
-------------------------------------------------------------------------
Enabled        Connected      Dedicated        Ethernet
Enabled        Disconnected   Dedicated        Wi-Fi 2
Disabled       Disconnected   Dedicated        Local Area Connection* 3
Enabled        Connected      Loopback         Loopback Pseudo-Interface 1

";

    const SHOW_CONFIG_STATIC: &str = "
Configuration for interface \"Ethernet\"
    DHCP enabled:                         No
    IP Address:                           192.168.1.50
    Subnet Prefix:                        192.168.1.0/24 (mask 255.255.255.0)
    Default Gateway:                      192.168.1.1
    Gateway Metric:                       1
    InterfaceMetric:                      25
    Statically Configured DNS Servers:    8.8.8.8
                                          1.1.1.1
    Register with which suffix:           Primary only
    Statically Configured WINS Servers:   None

";

    const SHOW_CONFIG_DHCP: &str = "
Configuration for interface \"Wi-Fi 2\"
    DHCP enabled:                         Yes
    IP Address:                           10.0.0.23
    Subnet Prefix:                        10.0.0.0/24 (mask 255.255.255.0)
    Default Gateway:                      10.0.0.1
    Gateway Metric:                       0
    InterfaceMetric:                      35
    DNS servers configured through DHCP:  10.0.0.1
                                          fe80::1
    Register with which suffix:           Primary only
    WINS servers configured through DHCP: None
";

    #[test]
    fn test_office_static_command() {
        let commands = commands_for(&office(), "Ethernet").unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].args(),
            [
                "interface", "ip", "set", "address", "Ethernet", "static",
                "192.168.1.50", "255.255.255.0", "192.168.1.1", "1",
            ]
        );
    }

    #[test]
    fn test_static_with_dns_and_without_gateway() {
        let mut profile = office();
        profile.gateway = None;
        profile.dns = Some("8.8.8.8".to_string());
        let commands = commands_for(&profile, "Wi-Fi 2").unwrap();
        assert_eq!(
            commands[0].args(),
            ["interface", "ip", "set", "address", "Wi-Fi 2", "static", "192.168.1.50", "255.255.255.0"]
        );
        assert_eq!(
            commands[1].args(),
            ["interface", "ip", "set", "dns", "Wi-Fi 2", "static", "8.8.8.8"]
        );
    }

    #[test]
    fn test_addresses_are_canonicalized() {
        let mut profile = office();
        profile.address = Some("192.168.001.050".to_string());
        let commands = commands_for(&profile, "Ethernet").unwrap();
        assert_eq!(commands[0].args()[6], "192.168.1.50");
    }

    #[test]
    fn test_dhcp_commands() {
        let commands = commands_for(&Profile::dhcp("Home", ""), "Ethernet").unwrap();
        assert_eq!(
            commands,
            vec![
                NetshCommand::set_address_dhcp("Ethernet"),
                NetshCommand::set_dns_dhcp("Ethernet"),
            ]
        );
    }

    #[test]
    fn test_invalid_profile_runs_nothing() {
        let netsh = Netsh::with_runner(RecordingRunner::default());
        let mut profile = office();
        profile.address = Some("192.168.1.999".to_string());
        match netsh.apply(&profile, "Ethernet") {
            Err(ApplyError::Invalid(e)) => assert_eq!(e.field(), Field::Address),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(netsh.runner().commands.borrow().is_empty());
    }

    #[test]
    fn test_blank_adapter_is_rejected() {
        assert!(matches!(commands_for(&office(), "  "), Err(ApplyError::NoAdapter)));
    }

    #[test]
    fn test_apply_twice_is_identical() {
        let netsh = Netsh::with_runner(RecordingRunner::default());
        let mut profile = office();
        profile.dns = Some("8.8.8.8".to_string());

        netsh.apply(&profile, "Ethernet").unwrap();
        netsh.apply(&profile, "Ethernet").unwrap();

        let commands = netsh.runner().commands.borrow();
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[..2], commands[2..]);
    }

    #[test]
    fn test_failure_stops_and_passes_output_through() {
        let netsh = Netsh::with_runner(RecordingRunner {
            fail_at: Some(0),
            ..Default::default()
        });
        match netsh.apply(&Profile::dhcp("Home", ""), "Wi-Fi 2") {
            Err(ApplyError::Failed { command, code, output }) => {
                assert_eq!(command, "netsh interface ip set address \"Wi-Fi 2\" dhcp");
                assert_eq!(code, Some(1));
                assert_eq!(
                    output,
                    "The requested operation requires elevation (Run as administrator)."
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(netsh.runner().commands.borrow().len(), 1);
    }

    #[test]
    fn test_missing_tool_is_spawn_error() {
        let netsh = Netsh::with_runner(MissingTool);
        assert!(matches!(
            netsh.apply(&office(), "Ethernet"),
            Err(ApplyError::Spawn { .. })
        ));
        assert_eq!(netsh.list_adapters(), vec!["Ethernet".to_string()]);
        assert_eq!(netsh.current_config("Ethernet"), None);
    }

    #[test]
    fn test_parse_interface_table() {
        assert_eq!(
            parse_interface_table(SHOW_INTERFACE),
            vec!["Ethernet", "Wi-Fi 2", "Local Area Connection* 3"]
        );
        assert!(parse_interface_table("").is_empty());
    }

    #[test]
    fn test_list_adapters_from_runner() {
        let netsh = Netsh::with_runner(RecordingRunner {
            stdout: SHOW_INTERFACE.to_string(),
            ..Default::default()
        });
        assert_eq!(netsh.list_adapters().len(), 3);
        assert_eq!(
            netsh.runner().commands.borrow()[0],
            NetshCommand::show_interfaces()
        );
    }

    #[test]
    fn test_parse_static_config() {
        let snapshot = parse_show_config(SHOW_CONFIG_STATIC).unwrap();
        assert_eq!(
            snapshot,
            AdapterSnapshot {
                dhcp: false,
                address: Some("192.168.1.50".to_string()),
                subnet_mask: Some("255.255.255.0".to_string()),
                gateway: Some("192.168.1.1".to_string()),
                dns_servers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            }
        );

        let profile = snapshot.to_profile("Captured", "Ethernet");
        assert_eq!(profile.mode, Mode::Static);
        assert_eq!(profile.dns.as_deref(), Some("8.8.8.8"));
        assert_eq!(validate::validate(&profile), Ok(()));
    }

    #[test]
    fn test_parse_dhcp_config() {
        let snapshot = parse_show_config(SHOW_CONFIG_DHCP).unwrap();
        assert!(snapshot.dhcp);
        assert_eq!(snapshot.address.as_deref(), Some("10.0.0.23"));
        assert_eq!(snapshot.dns_servers, vec!["10.0.0.1".to_string()]);
        assert_eq!(snapshot.to_profile("Cafe", "Wi-Fi 2"), Profile::dhcp("Cafe", "Wi-Fi 2"));
    }

    #[test]
    fn test_parse_config_rejects_unrelated_output() {
        assert_eq!(parse_show_config("The filename, directory name, or volume label syntax is incorrect."), None);
    }

    #[test]
    fn test_display_quotes_spaces() {
        let cmd = NetshCommand::set_dns_static("Wi-Fi 2", "8.8.8.8");
        assert_eq!(cmd.to_string(), "netsh interface ip set dns \"Wi-Fi 2\" static 8.8.8.8");
    }
}
