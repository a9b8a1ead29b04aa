use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, GeneralizedTime, PrintableStringRef, SetOfVec, UtcTime};
use der::Tag;
use rand_core::{OsRng, RngCore};
use time::{Date, Duration, Month, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::time::Time;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::extensions::{BasicConstraints, KeyUsage, SubjectAltName};
use crate::config::ValidityPeriod;
use crate::error::{CertMintError, Result};

/// Length in bytes of generated serial numbers.
pub const SERIAL_NUMBER_LEN: usize = 20;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
const POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// The fields of a certificate that do not depend on who signs it.
///
/// Built once per issuance and consumed by [`crate::issuer::Issuer::issue`].
///
/// # Fields
/// * `serial_number` - Big-endian positive serial number.
/// * `subject` - The distinguished name of the certificate subject.
/// * `validity` - The `notBefore`/`notAfter` window.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `key_usage` - Key usage bits; omitted from the certificate when empty.
/// * `usages` - A list of extended key usage options.
/// * `subject_alt_names` - DNS names and IP addresses.
#[derive(Clone, Debug, Builder)]
pub struct CertificateTemplate {
    pub serial_number: Vec<u8>,
    pub subject: DistinguishedName,
    pub validity: Validity,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub key_usage: KeyUsage,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub subject_alt_names: SubjectAltName,
}

impl CertificateTemplate {
    /// Encodes the template's own extensions, in the order they are written.
    ///
    /// Key identifiers are added later by the issuer, which knows both keys.
    pub fn extension_params(&self) -> Result<Vec<ExtensionParam>> {
        let basic_constraints = BasicConstraints {
            is_ca: self.is_ca,
            max_path_length: None,
        };

        let mut extensions = vec![ExtensionParam::from_extension(basic_constraints, true)?];

        if !self.key_usage.0.is_empty() {
            extensions.push(ExtensionParam::from_extension(self.key_usage, true)?);
        }

        if !self.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: self.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !self.subject_alt_names.is_empty() {
            // RFC 5280 4.2.1.6: critical when the subject name is empty.
            let critical = self.subject.is_empty();
            extensions.push(ExtensionParam::from_extension(
                self.subject_alt_names.clone(),
                critical,
            )?);
        }

        Ok(extensions)
    }
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Every attribute except the common name may hold several values. Each value
/// becomes its own RDN, in the order country, province, locality, street
/// address, postal code, organization, common name; values keep their list order.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(default, into)]
    pub common_name: String,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub street_address: Vec<String>,
    #[builder(default)]
    pub postal_code: Vec<String>,
}

impl DistinguishedName {
    /// Returns true when no attribute would be written.
    pub fn is_empty(&self) -> bool {
        self.attributes().next().is_none()
    }

    fn attributes(&self) -> impl Iterator<Item = (ObjectIdentifier, &str)> {
        let lists = [
            (COUNTRY, &self.country),
            (PROVINCE, &self.province),
            (LOCALITY, &self.locality),
            (STREET_ADDRESS, &self.street_address),
            (POSTAL_CODE, &self.postal_code),
            (ORGANIZATION, &self.organization),
        ];
        lists
            .into_iter()
            .flat_map(|(oid, values)| values.iter().map(move |v| (oid, v.as_str())))
            .chain(
                (!self.common_name.is_empty()).then_some((COMMON_NAME, self.common_name.as_str())),
            )
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Values are written as PrintableString when they fit its alphabet and
    /// as UTF8String otherwise.
    pub fn as_x509_name(&self) -> Result<Name> {
        let rdns = self
            .attributes()
            .map(|(oid, value)| -> std::result::Result<_, der::Error> {
                let tag = if PrintableStringRef::new(value).is_ok() {
                    Tag::PrintableString
                } else {
                    Tag::Utf8String
                };
                let attribute = AttributeTypeAndValue {
                    oid,
                    value: Any::new(tag, value.as_bytes())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![
                    attribute,
                ])?))
            })
            .collect::<std::result::Result<Vec<RelativeDistinguishedName>, _>>()
            .map_err(|e| CertMintError::InvalidConfig(format!("subject name: {e}")))?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes this type does not model are skipped.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self> {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = std::str::from_utf8(attr.value.value())
                    .map_err(|e| CertMintError::DecodingError(e.to_string()))?
                    .to_string();
                match attr.oid {
                    COMMON_NAME => dn.common_name = value,
                    COUNTRY => dn.country.push(value),
                    PROVINCE => dn.province.push(value),
                    LOCALITY => dn.locality.push(value),
                    STREET_ADDRESS => dn.street_address.push(value),
                    POSTAL_CODE => dn.postal_code.push(value),
                    ORGANIZATION => dn.organization.push(value),
                    _ => {}
                }
            }
        }

        Ok(dn)
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// A validity window opening now and lasting `period`.
    pub fn starting_now(period: &ValidityPeriod) -> Result<Self> {
        Self::starting_at(OffsetDateTime::now_utc(), period)
    }

    /// A validity window opening at `not_before` and lasting `period`,
    /// using calendar arithmetic.
    ///
    /// Month overflow carries into the year and day overflow carries into the
    /// following month, so 2024-02-29 plus one year is 2025-03-01 and
    /// 2024-01-31 plus one month is 2024-03-02.
    pub fn starting_at(not_before: OffsetDateTime, period: &ValidityPeriod) -> Result<Self> {
        let out_of_range = || {
            CertMintError::InvalidConfig(format!(
                "validity of {period:?} from {not_before} is out of range"
            ))
        };

        let months = i64::from(not_before.year()) * 12
            + i64::from(u8::from(not_before.month()) - 1)
            + i64::from(period.years) * 12
            + i64::from(period.months);
        let year = i32::try_from(months.div_euclid(12)).map_err(|_| out_of_range())?;
        let month = u8::try_from(months.rem_euclid(12) + 1)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(out_of_range)?;

        let first_of_month =
            Date::from_calendar_date(year, month, 1).map_err(|_| out_of_range())?;
        let day_offset = i64::from(not_before.day()) - 1 + i64::from(period.days);
        let date = first_of_month
            .checked_add(Duration::days(day_offset))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            not_before,
            not_after: date
                .with_time(not_before.time())
                .assume_offset(not_before.offset()),
        })
    }

    /// Encodes the window for a TBS certificate.
    ///
    /// Dates before 2050 are written as UTCTime and later ones as GeneralizedTime.
    pub fn to_x509_validity(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    /// Reads the window back out of a certificate.
    pub fn from_x509_validity(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }
}

fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let encoded = if at.year() < 2050 {
        UtcTime::from_system_time(at.into()).map(Time::UtcTime)
    } else {
        GeneralizedTime::from_system_time(at.into()).map(Time::GeneralTime)
    };
    encoded.map_err(|e| CertMintError::InvalidConfig(format!("time {at} cannot be encoded: {e}")))
}

fn from_x509_time(time: &Time) -> OffsetDateTime {
    match time {
        Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}

/// Draws a fresh serial number from the OS random source.
///
/// The top bit of the first byte is cleared and its low bit set, so the
/// INTEGER is always positive, non-zero and exactly [`SERIAL_NUMBER_LEN`] bytes.
pub fn generate_serial_number() -> Result<Vec<u8>> {
    let mut serial = vec![0u8; SERIAL_NUMBER_LEN];
    OsRng
        .try_fill_bytes(&mut serial)
        .map_err(|e| CertMintError::KeyGenerationError(format!("serial number: {e}")))?;
    serial[0] &= 0x7F;
    serial[0] |= 0x01;
    Ok(serial)
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    ///
    /// # Returns
    /// A decoded extension object.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn period(years: u32, months: u32, days: u32) -> ValidityPeriod {
        ValidityPeriod {
            years,
            months,
            days,
        }
    }

    #[test]
    fn test_one_year_lands_on_same_day() {
        let validity = Validity::starting_at(datetime!(2024-03-01 12:30:00 UTC), &period(1, 0, 0))
            .unwrap();
        assert_eq!(validity.not_after, datetime!(2025-03-01 12:30:00 UTC));
    }

    #[test]
    fn test_leap_day_plus_one_year_rolls_into_march() {
        let validity = Validity::starting_at(datetime!(2024-02-29 08:00:00 UTC), &period(1, 0, 0))
            .unwrap();
        assert_eq!(validity.not_after, datetime!(2025-03-01 08:00:00 UTC));
    }

    #[test]
    fn test_leap_day_plus_four_years_is_leap_day() {
        let validity = Validity::starting_at(datetime!(2024-02-29 08:00:00 UTC), &period(4, 0, 0))
            .unwrap();
        assert_eq!(validity.not_after, datetime!(2028-02-29 08:00:00 UTC));
    }

    #[test]
    fn test_month_end_overflow() {
        let validity = Validity::starting_at(datetime!(2024-01-31 00:00:00 UTC), &period(0, 1, 0))
            .unwrap();
        assert_eq!(validity.not_after, datetime!(2024-03-02 00:00:00 UTC));
    }

    #[test]
    fn test_months_and_days_carry() {
        let validity =
            Validity::starting_at(datetime!(2023-11-15 06:00:00 UTC), &period(1, 14, 20)).unwrap();
        assert_eq!(validity.not_after, datetime!(2026-02-04 06:00:00 UTC));
    }

    #[test]
    fn test_zero_period_is_empty_window() {
        let start = datetime!(2024-06-01 00:00:00 UTC);
        let validity = Validity::starting_at(start, &period(0, 0, 0)).unwrap();
        assert_eq!(validity.not_after, start);
    }

    #[test]
    fn test_out_of_range_period_is_config_error() {
        let err = Validity::starting_at(datetime!(2024-01-01 00:00:00 UTC), &period(100_000, 0, 0))
            .unwrap_err();
        assert!(matches!(err, CertMintError::InvalidConfig(_)));
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let validity = Validity {
            not_before: datetime!(2049-12-31 23:59:59 UTC),
            not_after: datetime!(2050-01-01 00:00:00 UTC),
        };
        let encoded = validity.to_x509_validity().unwrap();
        assert!(matches!(encoded.not_before, Time::UtcTime(_)));
        assert!(matches!(encoded.not_after, Time::GeneralTime(_)));
        assert_eq!(Validity::from_x509_validity(&encoded), validity);
    }

    #[test]
    fn test_distinguished_name_roundtrip_keeps_order() {
        let dn = DistinguishedName::builder()
            .common_name("example.com")
            .organization(vec!["Example".to_string(), "Example Labs".to_string()])
            .country(vec!["US".to_string()])
            .locality(vec!["Zürich".to_string()])
            .postal_code(vec!["8001".to_string()])
            .build();
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 6);
        let first = name.0.first().unwrap().0.iter().next().unwrap();
        let last = name.0.last().unwrap().0.iter().next().unwrap();
        assert_eq!(first.oid, COUNTRY);
        assert_eq!(last.oid, COMMON_NAME);
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), dn);
    }

    #[test]
    fn test_empty_common_name_is_omitted() {
        let dn = DistinguishedName::builder()
            .organization(vec!["Example".to_string()])
            .build();
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 1);
        assert!(!dn.is_empty());
        assert!(DistinguishedName::default().is_empty());
    }

    #[test]
    fn test_serial_numbers_are_positive_and_unique() {
        let first = generate_serial_number().unwrap();
        let second = generate_serial_number().unwrap();
        assert_eq!(first.len(), SERIAL_NUMBER_LEN);
        assert_eq!(first[0] & 0x80, 0);
        assert_ne!(first[0], 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_template_extensions() {
        let template = CertificateTemplate::builder()
            .serial_number(vec![1])
            .subject(DistinguishedName::default())
            .validity(Validity::starting_now(&period(1, 0, 0)).unwrap())
            .is_ca(true)
            .subject_alt_names(SubjectAltName {
                dns_names: vec!["example.com".to_string()],
                ip_addresses: vec![],
            })
            .build();
        let extensions = template.extension_params().unwrap();
        assert_eq!(extensions.len(), 2);

        let basic_constraints: BasicConstraints = extensions[0].to_extension().unwrap();
        assert!(basic_constraints.is_ca);
        assert!(extensions[0].critical);

        let san: SubjectAltName = extensions[1].to_extension().unwrap();
        assert_eq!(san.dns_names, vec!["example.com".to_string()]);
        assert!(extensions[1].critical, "SAN must be critical for an empty subject");
    }
}
