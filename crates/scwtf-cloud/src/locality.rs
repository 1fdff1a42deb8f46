//! Locality addressing
//!
//! Resource identifiers handed to the host carry the locality they live in:
//!
//! ```text
//! fr-par/11111111-1111-1111-1111-111111111111          regional
//! fr-par-1/11111111-1111-1111-1111-111111111111        zonal
//! fr-par/<instance-id>/<database-name>                 nested
//! fr-par/<bucket-name>@<project-id>                    project scoped
//! ```
//!
//! Users type these strings in import commands, so the shapes are stable.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Region tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "fr-par")]
    FrPar,
    #[serde(rename = "nl-ams")]
    NlAms,
    #[serde(rename = "pl-waw")]
    PlWaw,
}

/// Zone tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    #[serde(rename = "fr-par-1")]
    FrPar1,
    #[serde(rename = "fr-par-2")]
    FrPar2,
    #[serde(rename = "fr-par-3")]
    FrPar3,
    #[serde(rename = "nl-ams-1")]
    NlAms1,
    #[serde(rename = "nl-ams-2")]
    NlAms2,
    #[serde(rename = "nl-ams-3")]
    NlAms3,
    #[serde(rename = "pl-waw-1")]
    PlWaw1,
    #[serde(rename = "pl-waw-2")]
    PlWaw2,
    #[serde(rename = "pl-waw-3")]
    PlWaw3,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::FrPar, Region::NlAms, Region::PlWaw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::FrPar => "fr-par",
            Region::NlAms => "nl-ams",
            Region::PlWaw => "pl-waw",
        }
    }

    /// Zones of this region, in numeric order
    pub fn zones(&self) -> &'static [Zone] {
        match self {
            Region::FrPar => &[Zone::FrPar1, Zone::FrPar2, Zone::FrPar3],
            Region::NlAms => &[Zone::NlAms1, Zone::NlAms2, Zone::NlAms3],
            Region::PlWaw => &[Zone::PlWaw1, Zone::PlWaw2, Zone::PlWaw3],
        }
    }

    /// First zone of the region, used when only a region is configured
    pub fn default_zone(&self) -> Zone {
        self.zones()[0]
    }
}

impl Zone {
    pub const ALL: [Zone; 9] = [
        Zone::FrPar1,
        Zone::FrPar2,
        Zone::FrPar3,
        Zone::NlAms1,
        Zone::NlAms2,
        Zone::NlAms3,
        Zone::PlWaw1,
        Zone::PlWaw2,
        Zone::PlWaw3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::FrPar1 => "fr-par-1",
            Zone::FrPar2 => "fr-par-2",
            Zone::FrPar3 => "fr-par-3",
            Zone::NlAms1 => "nl-ams-1",
            Zone::NlAms2 => "nl-ams-2",
            Zone::NlAms3 => "nl-ams-3",
            Zone::PlWaw1 => "pl-waw-1",
            Zone::PlWaw2 => "pl-waw-2",
            Zone::PlWaw3 => "pl-waw-3",
        }
    }

    /// Region the zone belongs to
    pub fn region(&self) -> Region {
        match self {
            Zone::FrPar1 | Zone::FrPar2 | Zone::FrPar3 => Region::FrPar,
            Zone::NlAms1 | Zone::NlAms2 | Zone::NlAms3 => Region::NlAms,
            Zone::PlWaw1 | Zone::PlWaw2 | Zone::PlWaw3 => Region::PlWaw,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| CloudError::validation("region", format!("unknown region {s:?}")))
    }
}

impl FromStr for Zone {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Zone::ALL
            .into_iter()
            .find(|z| z.as_str() == lower)
            .ok_or_else(|| CloudError::validation("zone", format!("unknown zone {s:?}")))
    }
}

/// A region or a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    Region(Region),
    Zone(Zone),
}

impl Locality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locality::Region(r) => r.as_str(),
            Locality::Zone(z) => z.as_str(),
        }
    }

    /// Region of the locality (the zone's region for zones)
    pub fn region(&self) -> Region {
        match self {
            Locality::Region(r) => *r,
            Locality::Zone(z) => z.region(),
        }
    }
}

impl std::fmt::Display for Locality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locality {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(zone) = s.parse::<Zone>() {
            return Ok(Locality::Zone(zone));
        }
        if let Ok(region) = s.parse::<Region>() {
            return Ok(Locality::Region(region));
        }
        Err(CloudError::validation(
            "locality",
            format!("{s:?} is neither a region nor a zone"),
        ))
    }
}

impl From<Region> for Locality {
    fn from(region: Region) -> Self {
        Locality::Region(region)
    }
}

impl From<Zone> for Locality {
    fn from(zone: Zone) -> Self {
        Locality::Zone(zone)
    }
}

fn split_two(id: &str) -> Result<(&str, &str)> {
    let mut parts = id.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(locality), Some(rest), None) if !locality.is_empty() && !rest.is_empty() => {
            Ok((locality, rest))
        }
        _ => Err(CloudError::invalid_id(
            id,
            "expected {locality}/{id}",
        )),
    }
}

/// Parse `{region}/{id}`
pub fn parse_regional_id(id: &str) -> Result<(Region, String)> {
    let (locality, rest) = split_two(id)?;
    let region = locality
        .parse::<Region>()
        .map_err(|_| CloudError::invalid_id(id, format!("{locality:?} is not a region")))?;
    Ok((region, rest.to_string()))
}

/// Parse `{zone}/{id}`
pub fn parse_zonal_id(id: &str) -> Result<(Zone, String)> {
    let (locality, rest) = split_two(id)?;
    let zone = locality
        .parse::<Zone>()
        .map_err(|_| CloudError::invalid_id(id, format!("{locality:?} is not a zone")))?;
    Ok((zone, rest.to_string()))
}

/// Parse `{locality}/{id}` where the locality may be a region or a zone
pub fn parse_localized_id(id: &str) -> Result<(Locality, String)> {
    let (locality, rest) = split_two(id)?;
    let locality = locality
        .parse::<Locality>()
        .map_err(|_| CloudError::invalid_id(id, format!("{locality:?} is not a locality")))?;
    Ok((locality, rest.to_string()))
}

/// Parse `{region}/{parent}/{child}`. The child keeps any further `/`.
pub fn parse_nested_id(id: &str) -> Result<(Region, String, String)> {
    let mut parts = id.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(locality), Some(parent), Some(child))
            if !parent.is_empty() && !child.is_empty() =>
        {
            let region = locality.parse::<Region>().map_err(|_| {
                CloudError::invalid_id(id, format!("{locality:?} is not a region"))
            })?;
            Ok((region, parent.to_string(), child.to_string()))
        }
        _ => Err(CloudError::invalid_id(
            id,
            "expected {region}/{parent}/{child}",
        )),
    }
}

/// Parse `{locality}/{name}[@{project}]`
pub fn parse_project_scoped_id(id: &str) -> Result<(Locality, String, Option<String>)> {
    let (locality, name) = parse_localized_id(id)?;
    match name.rsplit_once('@') {
        Some((name, project)) if !name.is_empty() && !project.is_empty() => {
            Ok((locality, name.to_string(), Some(project.to_string())))
        }
        Some(_) => Err(CloudError::invalid_id(id, "empty name or project")),
        None => Ok((locality, name, None)),
    }
}

pub fn new_regional_id(region: Region, id: &str) -> String {
    format!("{region}/{id}")
}

pub fn new_zonal_id(zone: Zone, id: &str) -> String {
    format!("{zone}/{id}")
}

pub fn new_nested_id(region: Region, parent: &str, child: &str) -> String {
    format!("{region}/{parent}/{child}")
}

pub fn new_project_scoped_id(locality: Locality, name: &str, project: Option<&str>) -> String {
    match project {
        Some(project) => format!("{locality}/{name}@{project}"),
        None => format!("{locality}/{name}"),
    }
}

/// Accept either a bare ID or a localized one.
///
/// Bare IDs take the ambient default locality; localized IDs pass through.
pub fn expand_id(id: &str, default: Locality) -> Result<(Locality, String)> {
    if id.contains('/') {
        parse_localized_id(id)
    } else if id.is_empty() {
        Err(CloudError::invalid_id(id, "empty identifier"))
    } else {
        Ok((default, id.to_string()))
    }
}

/// Strip a leading locality segment if there is one
pub fn strip_locality(id: &str) -> &str {
    match id.split_once('/') {
        Some((head, rest)) if head.parse::<Locality>().is_ok() => rest,
        _ => id,
    }
}

/// Diff suppressor: true when both values point at the same ID, ignoring locality
pub fn diff_suppress_locality(old: &str, new: &str) -> bool {
    strip_locality(old) == strip_locality(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "11111111-1111-1111-1111-111111111111";

    #[test]
    fn test_parse_regional() {
        let (region, id) = parse_regional_id(&format!("fr-par/{UUID}")).unwrap();
        assert_eq!(region, Region::FrPar);
        assert_eq!(id, UUID);
    }

    #[test]
    fn test_parse_zonal_without_uuid_format() {
        let (zone, id) = parse_zonal_id("fr-par-1/abc").unwrap();
        assert_eq!(zone, Zone::FrPar1);
        assert_eq!(id, "abc");
    }

    #[test]
    fn test_parse_rejects_bare_tokens() {
        let err = parse_localized_id("xx").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(parse_regional_id("xx").is_err());
        assert!(parse_zonal_id("fr-par/abc").is_err());
        assert!(parse_regional_id("fr-par-1/abc").is_err());
        assert!(parse_regional_id("fr-par/").is_err());
        assert!(parse_regional_id("fr-par/a/b").is_err());
        assert!(parse_nested_id("fr-par/a").is_err());
    }

    #[test]
    fn test_locality_is_lowercased() {
        let (locality, id) = parse_localized_id("FR-PAR-2/ABCDEF").unwrap();
        assert_eq!(locality, Locality::Zone(Zone::FrPar2));
        assert_eq!(id, "ABCDEF");
    }

    #[test]
    fn test_roundtrip_all_regions_and_zones() {
        for region in Region::ALL {
            let id = new_regional_id(region, UUID);
            assert_eq!(parse_regional_id(&id).unwrap(), (region, UUID.to_string()));
            let nested = new_nested_id(region, UUID, "main");
            let (r, parent, child) = parse_nested_id(&nested).unwrap();
            assert_eq!(new_nested_id(r, &parent, &child), nested);
        }
        for zone in Zone::ALL {
            let id = new_zonal_id(zone, UUID);
            assert_eq!(parse_zonal_id(&id).unwrap(), (zone, UUID.to_string()));
        }
    }

    #[test]
    fn test_nested_child_keeps_slashes() {
        let (region, bucket, key) = parse_nested_id("nl-ams/my-bucket/dir/file.txt").unwrap();
        assert_eq!(region, Region::NlAms);
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "dir/file.txt");
    }

    #[test]
    fn test_project_scoped() {
        let id = new_project_scoped_id(Region::FrPar.into(), "bucket", Some(UUID));
        assert_eq!(id, format!("fr-par/bucket@{UUID}"));
        let (locality, name, project) = parse_project_scoped_id(&id).unwrap();
        assert_eq!(locality, Locality::Region(Region::FrPar));
        assert_eq!(name, "bucket");
        assert_eq!(project.as_deref(), Some(UUID));

        let (_, name, project) = parse_project_scoped_id("fr-par/bucket").unwrap();
        assert_eq!(name, "bucket");
        assert!(project.is_none());
    }

    #[test]
    fn test_zone_region_consistency() {
        for zone in Zone::ALL {
            assert!(zone.region().zones().contains(&zone));
        }
        assert_eq!(Region::FrPar.default_zone(), Zone::FrPar1);
    }

    #[test]
    fn test_expand_id() {
        let (locality, id) = expand_id(UUID, Region::PlWaw.into()).unwrap();
        assert_eq!(locality, Locality::Region(Region::PlWaw));
        assert_eq!(id, UUID);

        let (locality, _) = expand_id(&format!("nl-ams-1/{UUID}"), Region::PlWaw.into()).unwrap();
        assert_eq!(locality, Locality::Zone(Zone::NlAms1));
    }

    #[test]
    fn test_diff_suppress_locality() {
        assert!(diff_suppress_locality(&format!("fr-par/{UUID}"), UUID));
        assert!(diff_suppress_locality(
            &format!("fr-par-1/{UUID}"),
            &format!("fr-par/{UUID}")
        ));
        assert!(!diff_suppress_locality(&format!("fr-par/{UUID}"), "other"));
        assert!(diff_suppress_locality("plain", "plain"));
    }
}
