//! Fixed lookup tables: canonical profile fields with their aliases, key
//! noise tokens, photo keywords and hedging phrases.
//!
//! Built once (usually via `Default`) and shared read-only. Callers that
//! need different vocabularies construct their own value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Gender,
    BirthDate,
    IdNumber,
    Phone,
    Email,
    School,
    Degree,
    Major,
    GraduationDate,
    AppliedPosition,
    ExpectedCity,
    CurrentAddress,
    PoliticalStatus,
    EmergencyContact,
    EmergencyContactPhone,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 16] = [
        CanonicalField::Name,
        CanonicalField::Gender,
        CanonicalField::BirthDate,
        CanonicalField::IdNumber,
        CanonicalField::Phone,
        CanonicalField::Email,
        CanonicalField::School,
        CanonicalField::Degree,
        CanonicalField::Major,
        CanonicalField::GraduationDate,
        CanonicalField::AppliedPosition,
        CanonicalField::ExpectedCity,
        CanonicalField::CurrentAddress,
        CanonicalField::PoliticalStatus,
        CanonicalField::EmergencyContact,
        CanonicalField::EmergencyContactPhone,
    ];

    /// Label written into the standardized mapping block.
    pub fn label(self) -> &'static str {
        match self {
            CanonicalField::Name => "姓名",
            CanonicalField::Gender => "性别",
            CanonicalField::BirthDate => "出生日期",
            CanonicalField::IdNumber => "身份证号",
            CanonicalField::Phone => "手机号码",
            CanonicalField::Email => "电子邮箱",
            CanonicalField::School => "毕业院校",
            CanonicalField::Degree => "学历",
            CanonicalField::Major => "专业",
            CanonicalField::GraduationDate => "毕业时间",
            CanonicalField::AppliedPosition => "应聘岗位",
            CanonicalField::ExpectedCity => "期望城市",
            CanonicalField::CurrentAddress => "现居住地",
            CanonicalField::PoliticalStatus => "政治面貌",
            CanonicalField::EmergencyContact => "紧急联系人",
            CanonicalField::EmergencyContactPhone => "紧急联系人电话",
        }
    }

    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Name => &["名字", "姓名（中文）", "姓名(中文)", "name"],
            CanonicalField::Gender => &["gender"],
            CanonicalField::BirthDate => &["生日", "出生年月", "出生时间", "birth", "dateofbirth"],
            CanonicalField::IdNumber => &["身份证", "身份证号码", "证件号码", "id", "idcard"],
            CanonicalField::Phone => &[
                "手机号", "手机", "电话", "联系电话", "联系方式", "mobile", "phone",
            ],
            CanonicalField::Email => &["邮箱", "邮件", "email", "e-mail"],
            CanonicalField::School => &["毕业学校", "学校", "院校", "高校", "university", "college"],
            CanonicalField::Degree => &["教育程度", "education", "degree"],
            CanonicalField::Major => &["所学专业", "major"],
            CanonicalField::GraduationDate => &["毕业日期", "graduation", "graduationdate"],
            CanonicalField::AppliedPosition => &[
                "应聘职位", "求职岗位", "职位", "岗位", "position", "jobtitle",
            ],
            CanonicalField::ExpectedCity => &["意向城市", "目标城市", "求职城市", "expectedcity"],
            CanonicalField::CurrentAddress => &[
                "现居", "居住地", "居住地址", "地址", "address", "location",
            ],
            CanonicalField::PoliticalStatus => &["政治身份"],
            CanonicalField::EmergencyContact => &["联系人", "紧急联络人", "emergencycontact"],
            CanonicalField::EmergencyContactPhone => {
                &["紧急联系人手机号", "紧急联系电话", "emergencyphone"]
            }
        }
    }
}

/// A canonical field and every label that refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    pub field: CanonicalField,
    pub aliases: Vec<String>,
}

impl FieldAliases {
    /// The canonical label followed by the aliases, in lookup order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.field.label()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTables {
    /// Canonical fields in output order.
    pub fields: Vec<FieldAliases>,
    /// Removed from profile keys before lookup.
    pub noise_tokens: Vec<String>,
    /// A cell containing one of these (case-folded) is a photo slot.
    pub photo_keywords: Vec<String>,
    /// A value containing one of these signals uncertainty and is dropped.
    pub hedging_phrases: Vec<String>,
}

impl Default for FieldTables {
    fn default() -> Self {
        Self {
            fields: CanonicalField::ALL
                .iter()
                .map(|&field| FieldAliases {
                    field,
                    aliases: to_owned(field.default_aliases()),
                })
                .collect(),
            noise_tokens: to_owned(&[
                "必填", "选填", "必选", "可选", "required", "optional", "请填写", "请输入",
            ]),
            photo_keywords: to_owned(&["照片", "相片", "证件照", "photo", "portrait"]),
            hedging_phrases: to_owned(&[
                "无法确定",
                "未提供",
                "未知",
                "根据提供信息",
                "推断",
                "cannot be determined",
                "not provided",
                "unknown",
                "based on the information",
                "inferred",
            ]),
        }
    }
}

impl FieldTables {
    pub fn is_photo_label(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.photo_keywords
            .iter()
            .any(|k| folded.contains(&k.to_lowercase()))
    }

    /// True when `value` carries a hedging phrase. Matching is
    /// case-insensitive, which only matters for the Latin phrases.
    pub fn is_hedged(&self, value: &str) -> bool {
        let folded = value.to_lowercase();
        self.hedging_phrases
            .iter()
            .any(|p| folded.contains(&p.to_lowercase()))
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_cover_every_field() {
        let tables = FieldTables::default();
        assert_eq!(tables.fields.len(), CanonicalField::ALL.len());
        assert_eq!(tables.fields[0].field, CanonicalField::Name);
        assert_eq!(
            tables.fields[0].candidates().collect::<Vec<_>>(),
            vec!["姓名", "名字", "姓名（中文）", "姓名(中文)", "name"]
        );
    }

    #[test]
    fn test_photo_label_is_case_insensitive() {
        let tables = FieldTables::default();
        assert!(tables.is_photo_label("近期证件照"));
        assert!(tables.is_photo_label("PHOTO"));
        assert!(!tables.is_photo_label("姓名"));
    }

    #[test]
    fn test_hedging_phrases() {
        let tables = FieldTables::default();
        assert!(tables.is_hedged("根据提供信息推断为男"));
        assert!(tables.is_hedged("Unknown"));
        assert!(!tables.is_hedged("张三"));
    }
}
