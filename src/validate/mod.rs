use std::net::Ipv4Addr;

use crate::config::{Mode, Profile};
use crate::error::{Field, ValidationError};

/// 解析点分十进制 IPv4：恰好四段，每段 1-3 位数字，取值 0-255
///
/// 允许前导零（如 "192.168.001.050"），交给系统命令时应使用返回的规范地址
pub fn parse_ipv4(value: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = value.split('.');

    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse::<u16>().ok().and_then(|n| u8::try_from(n).ok())?;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(Ipv4Addr::from(octets))
}

/// 校验配置，返回第一个出错的字段
pub fn validate(profile: &Profile) -> Result<(), ValidationError> {
    if profile.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if profile.mode == Mode::Dhcp {
        return Ok(());
    }

    required(Field::Address, profile.address.as_deref())?;
    required(Field::SubnetMask, profile.subnet_mask.as_deref())?;
    optional(Field::Gateway, profile.gateway.as_deref())?;
    optional(Field::Dns, profile.dns.as_deref())?;

    Ok(())
}

fn required(field: Field, value: Option<&str>) -> Result<Ipv4Addr, ValidationError> {
    match value {
        Some(v) => check(field, v),
        None => Err(ValidationError::Missing { field }),
    }
}

fn optional(field: Field, value: Option<&str>) -> Result<Option<Ipv4Addr>, ValidationError> {
    value.map(|v| check(field, v)).transpose()
}

fn check(field: Field, value: &str) -> Result<Ipv4Addr, ValidationError> {
    parse_ipv4(value).ok_or_else(|| ValidationError::InvalidIpv4 {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_parse_ipv4_accepts_dotted_quads() {
        for ok in ["0.0.0.0", "255.255.255.255", "10.0.0.1", "192.168.1.50", "8.8.8.8"] {
            assert!(parse_ipv4(ok).is_some(), "{ok} should parse");
        }
        assert_eq!(parse_ipv4("010.001.000.009"), Some(Ipv4Addr::new(10, 1, 0, 9)));
    }

    #[test]
    fn test_parse_ipv4_rejects_bad_shapes() {
        for bad in [
            "",
            "1.2.3",
            "1.2.3.4.5",
            "256.1.1.1",
            "1.1.1.999",
            "1..1.1",
            "1.1.1.1.",
            "a.b.c.d",
            " 1.1.1.1",
            "1.1.1.+1",
            "1.1.1.-1",
            "1.1.1.0001",
        ] {
            assert!(parse_ipv4(bad).is_none(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_office_profile_is_valid() {
        assert_eq!(validate(&office()), Ok(()));
    }

    #[test]
    fn test_bad_address_is_reported() {
        let profile = Profile {
            name: "Bad".to_string(),
            mode: Mode::Static,
            address: Some("192.168.1.999".to_string()),
            ..Profile::default()
        };
        let err = validate(&profile).unwrap_err();
        assert_eq!(err.field(), Field::Address);
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_stops_at_first_invalid_field() {
        let mut profile = office();
        profile.subnet_mask = Some("255.255.255.256".to_string());
        profile.gateway = Some("nope".to_string());
        assert_eq!(validate(&profile).unwrap_err().field(), Field::SubnetMask);
    }

    #[test]
    fn test_missing_mask_on_static_profile() {
        let mut profile = office();
        profile.subnet_mask = None;
        assert_eq!(
            validate(&profile),
            Err(ValidationError::Missing { field: Field::SubnetMask })
        );
    }

    #[test]
    fn test_optional_fields_are_checked_when_present() {
        let mut profile = office();
        profile.gateway = None;
        assert_eq!(validate(&profile), Ok(()));

        profile.dns = Some("8.8.8".to_string());
        assert_eq!(validate(&profile).unwrap_err().field(), Field::Dns);
    }

    #[test]
    fn test_dhcp_ignores_address_fields() {
        let profile = Profile {
            name: "Home".to_string(),
            mode: Mode::Dhcp,
            address: Some("garbage".to_string()),
            ..Profile::default()
        };
        assert_eq!(validate(&profile), Ok(()));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut profile = office();
        profile.name = "   ".to_string();
        assert_eq!(validate(&profile), Err(ValidationError::EmptyName));
    }
}
