//! Bundled template sources, one per (dialect, command).
//!
//! These mirror the flat-text template files the tooling historically shipped;
//! value names double as record field names, so they stay lowercase.

/// Registry names for the bundled templates.
pub mod names {
    pub const ROUTEROS_SYSTEM_RESOURCE: &str = "routeros_system_resource_print";
    pub const ROUTEROS_SYSTEM_PACKAGE: &str = "routeros_system_package_print";
    pub const ROUTEROS_SYSTEM_ROUTERBOARD: &str = "routeros_system_routerboard_print";
    pub const ROUTEROS_USER_EXPORT: &str = "routeros_user_export_verbose";
    pub const IOS_SHOW_VERSION: &str = "ios_show_version";
    pub const IOS_SHOW_RUN_USERNAME: &str = "ios_show_run_include_username";
    pub const JUNOS_SHOW_VERSION: &str = "junos_show_version";
    pub const JUNOS_SYSTEM_LOGIN: &str = "junos_show_configuration_system_login";
    pub const QTECH_SHOW_VERSION: &str = "qtech_show_version";
    pub const QTECH_STARTUP_USERNAME: &str = "qtech_show_startup_include_username";
}

pub(crate) const SOURCES: &[(&str, &str)] = &[
    (names::ROUTEROS_SYSTEM_RESOURCE, ROUTEROS_SYSTEM_RESOURCE),
    (names::ROUTEROS_SYSTEM_PACKAGE, ROUTEROS_SYSTEM_PACKAGE),
    (names::ROUTEROS_SYSTEM_ROUTERBOARD, ROUTEROS_SYSTEM_ROUTERBOARD),
    (names::ROUTEROS_USER_EXPORT, ROUTEROS_USER_EXPORT),
    (names::IOS_SHOW_VERSION, IOS_SHOW_VERSION),
    (names::IOS_SHOW_RUN_USERNAME, IOS_SHOW_RUN_USERNAME),
    (names::JUNOS_SHOW_VERSION, JUNOS_SHOW_VERSION),
    (names::JUNOS_SYSTEM_LOGIN, JUNOS_SYSTEM_LOGIN),
    (names::QTECH_SHOW_VERSION, QTECH_SHOW_VERSION),
    (names::QTECH_STARTUP_USERNAME, QTECH_STARTUP_USERNAME),
];

/// RouterOS `system resource print`.
const ROUTEROS_SYSTEM_RESOURCE: &str = r"Value uptime (\S+)
Value version (\d+\.\d+\.\d+)
Value buildtime (.+)
Value freememory ([\d.]+)
Value totalmemory ([\d.]+)
Value cpuload (\d+)
Value freehdd ([\d.]+)
Value arch (\S+)
Value boardname (.+)

Start
  ^\s*uptime:\s+${uptime}
  ^\s*version:\s+${version}
  ^\s*build-time:\s+${buildtime}
  ^\s*free-memory:\s+${freememory}MiB
  ^\s*total-memory:\s+${totalmemory}MiB
  ^\s*cpu-load:\s+${cpuload}%
  ^\s*free-hdd-space:\s+${freehdd}MiB
  ^\s*architecture-name:\s+${arch}
  ^\s*board-name:\s+${boardname}
";

/// RouterOS `system package print terse`.
const ROUTEROS_SYSTEM_PACKAGE: &str = r"Value Required name (\S+)
Value version (\S+)
Value disabled (X?)

Start
  ^\s*\d+\s*${disabled}\s*name=${name} version=${version} -> Record
";

/// RouterOS `system routerboard print`.
const ROUTEROS_SYSTEM_ROUTERBOARD: &str = r"Value model (\S+)
Value currentfirmware (\S+)
Value upgradefirmware (\S+)

Start
  ^\s*model:\s+${model}
  ^\s*current-firmware:\s+${currentfirmware}
  ^\s*upgrade-firmware:\s+${upgradefirmware}
";

/// RouterOS `user export verbose`.
const ROUTEROS_USER_EXPORT: &str = r#"Value Required username ("?[\w.-]+"?)
Value group (\S+)

Start
  ^add name=${username} group=${group} -> Record
  ^add name=${username} -> Record
"#;

/// Cisco IOS `show version`.
const IOS_SHOW_VERSION: &str = r#"Value version ([^,\s]+)
Value model (\S+)
Value serial (\S+)
Value image ([^"]+)
Value uptime (.+)

Start
  ^Cisco IOS Software.*Version ${version}
  ^System image file is "${image}"
  ^.* uptime is ${uptime}
  ^[Pp]rocessor board ID ${serial}
  ^[Cc]isco ${model} \(.*\) processor
"#;

/// Cisco IOS `show running-config | include username`.
const IOS_SHOW_RUN_USERNAME: &str = r"Value Required username (\S+)
Value privilege (\d+)

Start
  ^username ${username} privilege ${privilege} -> Record
  ^username ${username} -> Record
";

/// Juniper `show version`.
const JUNOS_SHOW_VERSION: &str = r"Value model (\S+)
Value version (\S+)

Start
  ^Model: ${model}
  ^Junos: ${version}
  ^JUNOS Software Release \[${version}\]

";

/// Juniper `show configuration system login`.
const JUNOS_SYSTEM_LOGIN: &str = r"Value Required username (\S+)
Value uid (\d+)
Value class (\S+)

Start
  ^\s*user \S+ \{ -> Continue.Record
  ^\s*user ${username} \{
  ^\s+uid ${uid};
  ^\s+class ${class};
";

/// Qtech `show version`.
const QTECH_SHOW_VERSION: &str = r"Value version (\S+)
Value hardware (\S+)
Value uptime (.+)

Start
  ^\s*SoftWare (?:Package )?Version ${version}
  ^\s*HardWare Version ${hardware}
  ^\s*Uptime is ${uptime}
";

/// Qtech `show startup-config | include username`.
const QTECH_STARTUP_USERNAME: &str = r"Value Required username (\S+)
Value privilege (\d+)

Start
  ^username ${username} privilege ${privilege} -> Record
  ^username ${username} -> Record
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    #[test]
    fn test_all_builtin_sources_compile() {
        for (name, source) in SOURCES {
            Template::parse(source).unwrap_or_else(|e| panic!("template '{name}': {e}"));
        }
    }

    #[test]
    fn test_routeros_package_terse() {
        let template = Template::parse(ROUTEROS_SYSTEM_PACKAGE).unwrap();
        let text = " 0   name=system version=6.46.5\n 1 X name=ipv6 version=6.46.5\n 2   name=wireless version=6.46.5\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["name"].as_str(), "system");
        assert_eq!(records[1]["disabled"].as_str(), "X");
        assert_eq!(records[2]["name"].as_str(), "wireless");
    }

    #[test]
    fn test_routerboard_print() {
        let template = Template::parse(ROUTEROS_SYSTEM_ROUTERBOARD).unwrap();
        let text = "       routerboard: yes\n             model: RBM33G\n  factory-firmware: 6.43.10\n  current-firmware: 6.45.9\n  upgrade-firmware: 6.46.5\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["currentfirmware"].as_str(), "6.45.9");
        assert_eq!(records[0]["upgradefirmware"].as_str(), "6.46.5");
    }

    #[test]
    fn test_junos_system_login_users() {
        let template = Template::parse(JUNOS_SYSTEM_LOGIN).unwrap();
        let text = "user admin {\n    uid 2000;\n    class super-user;\n}\nuser ro {\n    uid 2001;\n    class read-only;\n}\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["username"].as_str(), "admin");
        assert_eq!(records[0]["class"].as_str(), "super-user");
        assert_eq!(records[1]["uid"].as_str(), "2001");
    }

    #[test]
    fn test_ios_username_lines() {
        let template = Template::parse(IOS_SHOW_RUN_USERNAME).unwrap();
        let text = "username admin privilege 15 secret 5 $1$abcd\nusername backup password 0 hunter2\n";
        let records = template.parse_text(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["username"].as_str(), "admin");
        assert_eq!(records[0]["privilege"].as_str(), "15");
        assert_eq!(records[1]["username"].as_str(), "backup");
        assert_eq!(records[1]["privilege"].as_str(), "");
    }
}
