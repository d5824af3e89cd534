use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! prefectures {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// The 47 Japanese prefectures. Serialized as their Japanese names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Prefecture {
            $($variant),+
        }

        impl Prefecture {
            pub const ALL: &'static [Prefecture] = &[$(Prefecture::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Prefecture::$variant => $name),+
                }
            }
        }

        impl FromStr for Prefecture {
            type Err = UnknownPrefecture;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Prefecture::$variant),)+
                    _ => Err(UnknownPrefecture(s.to_string())),
                }
            }
        }
    };
}

prefectures! {
    Hokkaido => "北海道",
    Aomori => "青森県",
    Iwate => "岩手県",
    Miyagi => "宮城県",
    Akita => "秋田県",
    Yamagata => "山形県",
    Fukushima => "福島県",
    Ibaraki => "茨城県",
    Tochigi => "栃木県",
    Gunma => "群馬県",
    Saitama => "埼玉県",
    Chiba => "千葉県",
    Tokyo => "東京都",
    Kanagawa => "神奈川県",
    Niigata => "新潟県",
    Toyama => "富山県",
    Ishikawa => "石川県",
    Fukui => "福井県",
    Yamanashi => "山梨県",
    Nagano => "長野県",
    Gifu => "岐阜県",
    Shizuoka => "静岡県",
    Aichi => "愛知県",
    Mie => "三重県",
    Shiga => "滋賀県",
    Kyoto => "京都府",
    Osaka => "大阪府",
    Hyogo => "兵庫県",
    Nara => "奈良県",
    Wakayama => "和歌山県",
    Tottori => "鳥取県",
    Shimane => "島根県",
    Okayama => "岡山県",
    Hiroshima => "広島県",
    Yamaguchi => "山口県",
    Tokushima => "徳島県",
    Kagawa => "香川県",
    Ehime => "愛媛県",
    Kochi => "高知県",
    Fukuoka => "福岡県",
    Saga => "佐賀県",
    Nagasaki => "長崎県",
    Kumamoto => "熊本県",
    Oita => "大分県",
    Miyazaki => "宮崎県",
    Kagoshima => "鹿児島県",
    Okinawa => "沖縄県",
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPrefecture(pub String);

impl fmt::Display for UnknownPrefecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown prefecture: {:?}", self.0)
    }
}

impl std::error::Error for UnknownPrefecture {}

impl fmt::Display for Prefecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Prefecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Prefecture {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
