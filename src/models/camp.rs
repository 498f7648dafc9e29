use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::camp_entity;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CampQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateCampRequest {
    pub name: String,
    pub address: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
    pub region: String,
    pub tel: String,
}

impl CreateCampRequest {
    pub fn validate(&self) -> AppResult<()> {
        let checks: [(&str, &str, usize); 7] = [
            ("name", &self.name, NAME_MAX),
            ("address", &self.address, ADDRESS_MAX),
            ("district", &self.district, DISTRICT_MAX),
            ("province", &self.province, PROVINCE_MAX),
            ("postal_code", &self.postal_code, POSTAL_CODE_MAX),
            ("region", &self.region, REGION_MAX),
            ("tel", &self.tel, TEL_MAX),
        ];
        for (field, value, max) in checks {
            check_field(field, value, max)?;
        }
        Ok(())
    }
}

/// 修改营地, 未提供的字段保持不变
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateCampRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub region: Option<String>,
    pub tel: Option<String>,
}

impl UpdateCampRequest {
    pub fn validate(&self) -> AppResult<()> {
        let checks: [(&str, &Option<String>, usize); 7] = [
            ("name", &self.name, NAME_MAX),
            ("address", &self.address, ADDRESS_MAX),
            ("district", &self.district, DISTRICT_MAX),
            ("province", &self.province, PROVINCE_MAX),
            ("postal_code", &self.postal_code, POSTAL_CODE_MAX),
            ("region", &self.region, REGION_MAX),
            ("tel", &self.tel, TEL_MAX),
        ];
        for (field, value, max) in checks {
            if let Some(value) = value {
                check_field(field, value, max)?;
            }
        }
        Ok(())
    }
}

const NAME_MAX: usize = 50;
const ADDRESS_MAX: usize = 500;
const DISTRICT_MAX: usize = 100;
const PROVINCE_MAX: usize = 100;
const POSTAL_CODE_MAX: usize = 5;
const REGION_MAX: usize = 50;
const TEL_MAX: usize = 20;

fn check_field(field: &str, value: &str, max: usize) -> AppResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("Please add a {field}")));
    }
    if value.chars().count() > max {
        return Err(AppError::ValidationError(format!(
            "{field} cannot be more than {max} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampResponse {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub address: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
    pub region: String,
    pub tel: String,
    pub created_at: DateTime<Utc>,
}

impl From<camp_entity::Model> for CampResponse {
    fn from(m: camp_entity::Model) -> Self {
        CampResponse {
            id: m.id,
            owner_id: m.owner_id,
            name: m.name,
            address: m.address,
            district: m.district,
            province: m.province,
            postal_code: m.postal_code,
            region: m.region,
            tel: m.tel,
            created_at: m.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateCampRequest {
        CreateCampRequest {
            name: "Khao Yai Camp".into(),
            address: "1 Forest Rd".into(),
            district: "Pak Chong".into(),
            province: "Nakhon Ratchasima".into(),
            postal_code: "30130".into(),
            region: "Northeast".into(),
            tel: "044-000-000".into(),
        }
    }

    #[test]
    fn test_validate_lengths() {
        assert!(request().validate().is_ok());

        let mut long_postal = request();
        long_postal.postal_code = "301300".into();
        assert!(long_postal.validate().is_err());

        let mut blank = request();
        blank.name = "  ".into();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        assert!(UpdateCampRequest::default().validate().is_ok());

        let rename = UpdateCampRequest {
            name: Some("Doi Inthanon Camp".into()),
            ..Default::default()
        };
        assert!(rename.validate().is_ok());

        let blank_tel = UpdateCampRequest {
            tel: Some(" ".into()),
            ..Default::default()
        };
        assert!(blank_tel.validate().is_err());
    }
}
