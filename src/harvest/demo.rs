//! Offline demo dataset
//!
//! `DemoSource` serves a fixed set of sample vacancies through the same
//! `PageSource` seam as the HTTP fetcher, so the whole engine (dispatch,
//! ordering, search, export) can be run without network access.

use crate::harvest::fetcher::{Page, PageCursor, PageResult, PageSource};
use crate::table::Record;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Number of times the base sample is repeated
const DEMO_REPETITIONS: u64 = 50;

/// Records per demo page, matching the live server
const DEMO_PAGE_SIZE: u64 = 10;

fn base_sample() -> Vec<Value> {
    vec![
        json!({
            "jabatan_nm": "PENATA LAYANAN OPERASIONAL",
            "ins_nm": "Badan Gizi Nasional",
            "lokasi_nm": "Direktorat Penyediaan dan Penyaluran Wilayah I - Deputi Bidang Penyediaan dan Penyaluran",
            "formasi_nm": "PPPK Teknis Khusus",
            "disable": "Ya",
            "penghasilan": "0 - 0",
            "jumlah_formasi": 10081,
            "status": "DITUTUP"
        }),
        json!({
            "jabatan_nm": "PENATA LAYANAN OPERASIONAL",
            "ins_nm": "Badan Gizi Nasional",
            "lokasi_nm": "Direktorat Penyediaan dan Penyaluran Wilayah II - Deputi Bidang Penyediaan dan Penyaluran",
            "formasi_nm": "PPPK Teknis Khusus",
            "disable": "Ya",
            "penghasilan": "0 - 0",
            "jumlah_formasi": 12493,
            "status": "DITUTUP"
        }),
        json!({
            "jabatan_nm": "PENATA LAYANAN OPERASIONAL",
            "ins_nm": "Badan Gizi Nasional",
            "lokasi_nm": "Direktorat Penyediaan dan Penyaluran Wilayah III | Deputi Bidang Penyediaan dan Penyaluran",
            "formasi_nm": "PPPK Teknis Khusus",
            "disable": "Ya",
            "penghasilan": "0 - 0",
            "jumlah_formasi": 8444,
            "status": "DITUTUP"
        }),
        json!({
            "jabatan_nm": "PENATA LAYANAN OPERASIONAL",
            "ins_nm": "Badan Gizi Nasional",
            "lokasi_nm": "Biro Umum dan Keuangan - Sekretariat Utama",
            "formasi_nm": "PPPK Teknis Khusus",
            "disable": "Ya",
            "penghasilan": "0 - 0",
            "jumlah_formasi": 10,
            "status": "DITUTUP"
        }),
        json!({
            "jabatan_nm": "PENATA LAYANAN OPERASIONAL",
            "ins_nm": "Badan Gizi Nasional",
            "lokasi_nm": "Biro Hukum dan Hubungan Masyarakat - Sekretariat Utama",
            "formasi_nm": "PPPK Teknis Khusus",
            "disable": "Ya",
            "penghasilan": "0 - 0",
            "jumlah_formasi": 10,
            "status": "DITUTUP"
        }),
        json!({
            "jabatan_nm": "PROGRAMMER",
            "ins_nm": "Kementerian Komunikasi dan Informatika",
            "lokasi_nm": "Direktorat Jenderal Aplikasi Informatika",
            "formasi_nm": "CPNS",
            "disable": "Tidak",
            "penghasilan": "4.5 - 6.0",
            "jumlah_formasi": 15,
            "pendidikan_nm": "S1 TEKNIK INFORMATIKA/ILMU KOMPUTER/SISTEM INFORMASI",
            "status": "BUKA"
        }),
        json!({
            "jabatan_nm": "ANALIS KEBIJAKAN AHLI PERTAMA",
            "ins_nm": "Kementerian Komunikasi dan Informatika",
            "lokasi_nm": "Sekretariat Jenderal",
            "formasi_nm": "CPNS",
            "disable": "Tidak",
            "penghasilan": "4.2 - 5.8",
            "jumlah_formasi": 8,
            "pendidikan_nm": "S1 ADMINISTRASI NEGARA/ADMINISTRASI PUBLIK",
            "status": "BUKA"
        }),
        json!({
            "jabatan_nm": "STATISTISI AHLI PERTAMA",
            "ins_nm": "Badan Pusat Statistik",
            "lokasi_nm": "Direktorat Statistik Kependudukan dan Ketenagakerjaan",
            "formasi_nm": "CPNS",
            "disable": "Ya",
            "penghasilan": "4.0 - 5.5",
            "jumlah_formasi": 25,
            "pendidikan_nm": "S1 STATISTIKA/MATEMATIKA",
            "status": "BUKA"
        }),
        json!({
            "jabatan_nm": "PENELITI AHLI PERTAMA",
            "ins_nm": "Badan Riset dan Inovasi Nasional",
            "lokasi_nm": "Organisasi Riset Ilmu Pengetahuan Alam",
            "formasi_nm": "CPNS",
            "disable": "Tidak",
            "penghasilan": "5.0 - 7.0",
            "jumlah_formasi": 12,
            "pendidikan_nm": "S2 FISIKA/KIMIA/BIOLOGI",
            "status": "BUKA"
        }),
        json!({
            "jabatan_nm": "AUDITOR AHLI PERTAMA",
            "ins_nm": "Badan Pengawasan Keuangan dan Pembangunan",
            "lokasi_nm": "Deputi Bidang Pengawasan Penyelenggaraan Keuangan Daerah",
            "formasi_nm": "CPNS",
            "disable": "Tidak",
            "penghasilan": "4.8 - 6.5",
            "jumlah_formasi": 20,
            "pendidikan_nm": "S1 AKUNTANSI/EKONOMI",
            "status": "BUKA"
        }),
    ]
}

/// Builds the demo dataset: the base sample repeated, with `jumlah_formasi`
/// shifted by the repetition index so repeated rows stay distinguishable
pub fn demo_records() -> Vec<Record> {
    let sample = base_sample();
    let mut records = Vec::with_capacity(sample.len() * DEMO_REPETITIONS as usize);

    for repetition in 0..DEMO_REPETITIONS {
        for item in &sample {
            let mut item = item.clone();
            if let Some(count) = item.get("jumlah_formasi").and_then(Value::as_u64) {
                item["jumlah_formasi"] = json!(count + repetition);
            }
            if let Some(record) = Record::from_json(item) {
                records.push(record);
            }
        }
    }

    records
}

/// Serves a fixed record list in pages, reporting its size as the total hint
#[derive(Debug, Clone)]
pub struct DemoSource {
    records: Vec<Record>,
    page_size: u64,
}

impl DemoSource {
    /// The built-in demo dataset
    pub fn new() -> Self {
        Self::from_records(demo_records())
    }

    /// Serves `records` instead of the built-in dataset
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            page_size: DEMO_PAGE_SIZE,
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSource for DemoSource {
    async fn fetch_page(&self, cursor: PageCursor, _filter: &str) -> PageResult {
        let len = self.records.len();
        let start = usize::try_from(cursor.offset()).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(self.page_size as usize).min(len);

        PageResult::Items(Page {
            cursor,
            records: self.records[start..end].to_vec(),
            total_hint: Some(len as u64),
        })
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_records() {
        let records = demo_records();
        assert_eq!(records.len(), 500);

        assert_eq!(records[0].get("jumlah_formasi").unwrap().to_string(), "10081");
        assert_eq!(records[10].get("jumlah_formasi").unwrap().to_string(), "10082");
        assert_eq!(records[499].get("jumlah_formasi").unwrap().to_string(), "69");
        assert_eq!(
            records[5].get("pendidikan_nm").unwrap().to_string(),
            "S1 TEKNIK INFORMATIKA/ILMU KOMPUTER/SISTEM INFORMASI"
        );
    }

    #[tokio::test]
    async fn test_demo_source_pages() {
        let source = DemoSource::new();

        let PageResult::Items(first) = source.fetch_page(PageCursor::FIRST, "").await else {
            panic!("demo source never fails");
        };
        assert_eq!(first.records.len(), 10);
        assert_eq!(first.total_hint, Some(500));

        let PageResult::Items(past_end) = source
            .fetch_page(PageCursor::for_page(50, 10), "")
            .await
        else {
            panic!("demo source never fails");
        };
        assert!(past_end.records.is_empty());
    }
}
