//! Mount and unmount behaviour across well-formed, empty and broken images

use ewfs::{BlockRead, Ewfs, EwfsBuilder, EwfsError, ImageBuilder, MemoryMedia, ResultCode};

/// Media that serves the first `budget` reads and fails the rest
struct FlakyMedia {
    inner: MemoryMedia,
    budget: usize,
}

impl BlockRead for FlakyMedia {
    fn read(&mut self, disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        self.inner.read(disk_id, dest, address)
    }
}

fn site_image() -> Vec<u8> {
    ImageBuilder::new()
        .add_static("index.html", b"<html><body>hello</body></html>")
        .add_static("css/site.css", b"body { color: red; }")
        .add_generated("largefile.json")
        .add_generated("me.json")
        .build()
}

#[test]
fn test_mount_formatted_image() {
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(site_image()));
    fs.mount(0).unwrap();

    let header = fs.header();
    assert!(header.formatted);
    assert_eq!(header.disk_id, 0);
    assert_eq!(header.file_count, 4);
    assert_eq!(header.file_start_address, 7 + 4 * 11);
    assert!(fs.lookup("css/site.css").is_some());
    assert!(fs.lookup("missing.txt").is_none());
}

#[test]
fn test_mount_without_magic_is_empty_volume() {
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF".to_vec()));
    fs.mount(0).unwrap();

    assert!(fs.is_mounted());
    assert!(!fs.header().formatted);
    assert_eq!(fs.header().file_count, 0);
    assert!(matches!(fs.open("0:/index.html"), Err(EwfsError::NoFile(_))));
}

#[test]
fn test_mount_zero_file_image() {
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(ImageBuilder::new().build()));
    fs.mount(0).unwrap();

    assert!(fs.header().formatted);
    assert_eq!(fs.header().file_count, 0);
    assert!(fs.entries().is_empty());
    // Magic, version, count; no index read
    assert_eq!(fs.media().reads(), 3);
}

#[test]
fn test_mount_invalid_disk_leaves_state() {
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(site_image()));
    let err = fs.mount(1).unwrap_err();
    assert!(matches!(err, EwfsError::DiskError { disk_id: 1 }));
    assert_eq!(err.code(), ResultCode::DiskError);
    assert!(!fs.is_mounted());
    assert_eq!(fs.media().reads(), 0);

    fs.mount(0).unwrap();
    assert!(matches!(fs.mount(7), Err(EwfsError::DiskError { disk_id: 7 })));
    assert_eq!(fs.header().disk_id, 0);
}

#[test]
fn test_mount_read_failure() {
    for budget in 0..4 {
        let media = FlakyMedia {
            inner: MemoryMedia::new(site_image()),
            budget,
        };
        let mut fs = Ewfs::with_defaults(media);
        let err = fs.mount(0).unwrap_err();
        assert!(matches!(err, EwfsError::DiskRead { .. }), "budget {}", budget);
        assert_eq!(err.code(), ResultCode::DiskError);
        assert!(!fs.is_mounted());
    }
}

#[test]
fn test_truncated_index_fails_mount() {
    let mut image = site_image();
    image.truncate(20);
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(image));
    assert!(matches!(fs.mount(0), Err(EwfsError::DiskRead { address: 7, len: 44 })));
}

#[test]
fn test_version_mismatch_still_mounts() {
    let image = ImageBuilder::new()
        .version(9)
        .add_static("a.txt", b"abc")
        .build();
    let mut fs = Ewfs::with_defaults(MemoryMedia::new(image));
    fs.mount(0).unwrap();
    assert_eq!(fs.header().version, 9);
    assert_eq!(fs.read_file("0:/a.txt", 16).unwrap(), b"abc");
}

#[test]
fn test_remount_after_unmount() {
    let mut fs = EwfsBuilder::new(MemoryMedia::new(site_image()))
        .volume_count(2)
        .build()
        .unwrap();

    fs.mount(1).unwrap();
    assert!(matches!(fs.open("0:/index.html"), Err(EwfsError::InvalidParameter(_))));
    let handle = fs.open("1:/index.html").unwrap();
    assert_eq!(handle.disk_id(), 1);

    assert!(matches!(fs.unmount(0), Err(EwfsError::DiskError { disk_id: 0 })));
    fs.unmount(1).unwrap();
    assert_eq!(fs.open_files(), 0);

    fs.mount(0).unwrap();
    assert_eq!(fs.read_file("0:/css/site.css", 4).unwrap(), b"body { color: red; }");
}

#[test]
fn test_image_at_base_address() {
    let media = MemoryMedia::new(site_image()).with_base_address(0x9000_0000);
    let mut fs = Ewfs::with_defaults(media);
    fs.mount(0).unwrap();

    assert_eq!(fs.header().base_address, 0x9000_0000);
    assert_eq!(
        fs.read_file("0:/index.html", 7).unwrap(),
        b"<html><body>hello</body></html>"
    );
}
