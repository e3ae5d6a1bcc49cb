//! The fixed set of regions with shard files

use ha_core::model::Region;

/// Every region the ingestion worker loads, in load order. The code is
/// the shard file stem; the name is the display form stamped on records.
pub static REGIONS: &[Region] = &[
    Region { code: "taipei", name: "台北市" },
    Region { code: "newtaipei", name: "新北市" },
    Region { code: "taoyuan", name: "桃園市" },
    Region { code: "taichung", name: "台中市" },
    Region { code: "tainan", name: "台南市" },
    Region { code: "kaohsiung", name: "高雄市" },
    Region { code: "keelung", name: "基隆市" },
    Region { code: "hsinchu", name: "新竹市" },
    Region { code: "chiayi", name: "嘉義市" },
    Region { code: "hsinchu-county", name: "新竹縣" },
    Region { code: "miaoli", name: "苗栗縣" },
    Region { code: "changhua", name: "彰化縣" },
    Region { code: "nantou", name: "南投縣" },
    Region { code: "yunlin", name: "雲林縣" },
    Region { code: "chiayi-county", name: "嘉義縣" },
    Region { code: "pingtung", name: "屏東縣" },
    Region { code: "yilan", name: "宜蘭縣" },
    Region { code: "hualien", name: "花蓮縣" },
    Region { code: "taitung", name: "台東縣" },
    Region { code: "penghu", name: "澎湖縣" },
    Region { code: "kinmen", name: "金門縣" },
];

/// Look up a region by its shard code.
pub fn by_code(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code == code)
}
