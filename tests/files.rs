mod common;

use bytefs::{EntryKind, FsError, UNIT_SIZE};
use common::{assert_consistent, fresh_volume, names, payload, UNITS};

#[test]
fn copy_in_then_copy_out_round_trips() {
    let mut vol = fresh_volume(UNITS);
    for (i, len) in [1usize, 2, 7, 100, 1000].into_iter().enumerate() {
        let name = format!("f{i}");
        let data = payload(len);
        let info = vol.copy_in(&data, &name).unwrap();
        assert_eq!(info.kind, EntryKind::File);
        assert_eq!(info.size, len as u64);
        assert_eq!(info.end - info.start + 1, len as u32 / UNIT_SIZE);
        assert_eq!(vol.copy_out(&name).unwrap(), data);
    }
    assert_consistent(&vol);
}

#[test]
fn name_conflict_leaves_image_untouched() {
    let mut vol = fresh_volume(UNITS);
    vol.copy_in(b"original", "x").unwrap();
    let before = vol.device().snapshot();

    let err = vol.copy_in(b"otro contenido", "x").unwrap_err();
    assert!(matches!(err, FsError::NameConflict(_)));
    let err = vol.mkdir("x").unwrap_err();
    assert!(matches!(err, FsError::NameConflict(_)));

    assert_eq!(vol.device().snapshot(), before);
    assert_eq!(vol.copy_out("x").unwrap(), b"original");
}

#[test]
fn invalid_input_is_rejected_before_allocation() {
    let mut vol = fresh_volume(UNITS);
    let before = vol.device().snapshot();

    assert!(matches!(
        vol.copy_in(b"data", "nombre-de-17-byte"),
        Err(FsError::NameTooLong(_))
    ));
    assert!(matches!(vol.copy_in(b"data", ".."), Err(FsError::InvalidName(_))));
    assert!(matches!(vol.copy_in(b"data", "a/b"), Err(FsError::InvalidName(_))));
    assert!(matches!(vol.copy_in(b"", "vacio"), Err(FsError::EmptyContent)));

    let free = vol.usage().unwrap().free_units;
    let too_big = payload(free as usize + 1);
    assert!(matches!(
        vol.copy_in(&too_big, "grande"),
        Err(FsError::InsufficientSpace { .. })
    ));

    assert_eq!(vol.device().snapshot(), before);
}

#[test]
fn sixteen_byte_name_is_accepted() {
    let mut vol = fresh_volume(UNITS);
    vol.copy_in(b"ok", "abcdefghijklmnop").unwrap();
    assert_eq!(names(&vol, vol.root_anchor()), vec!["abcdefghijklmnop"]);
}

#[test]
fn copy_out_only_matches_files() {
    let mut vol = fresh_volume(UNITS);
    vol.mkdir("d").unwrap();
    assert!(matches!(vol.copy_out("d"), Err(FsError::NotFound(_))));
    assert!(matches!(vol.copy_out("nada"), Err(FsError::NotFound(_))));
}

#[test]
fn directory_holds_fourteen_user_entries() {
    let mut vol = fresh_volume(UNITS);
    for i in 0..14 {
        vol.copy_in(b"z", &format!("f{i}")).unwrap();
    }
    let usage = vol.usage().unwrap();

    let err = vol.copy_in(b"z", "f14").unwrap_err();
    assert!(matches!(err, FsError::DirectoryFull { .. }));
    let err = vol.mkdir("d").unwrap_err();
    assert!(matches!(err, FsError::DirectoryFull { .. }));

    assert_eq!(vol.usage().unwrap(), usage);
    assert_eq!(vol.list_current().unwrap().len(), 14);
    assert_consistent(&vol);
}

#[test]
fn rename_rewrites_only_the_name() {
    let mut vol = fresh_volume(UNITS);
    let a = vol.copy_in(b"contenido", "a").unwrap();
    vol.copy_in(b"otro", "b").unwrap();

    vol.rename("a", "c").unwrap();
    let c = vol
        .list_current()
        .unwrap()
        .into_iter()
        .find(|e| e.name == "c")
        .unwrap();
    assert_eq!((c.start, c.end, c.kind), (a.start, a.end, a.kind));
    assert_eq!(vol.copy_out("c").unwrap(), b"contenido");

    assert!(matches!(vol.rename("c", "b"), Err(FsError::NameConflict(_))));
    assert!(matches!(vol.rename("a", "z"), Err(FsError::NotFound(_))));
    assert!(matches!(
        vol.rename("c", "nombre-de-17-byte"),
        Err(FsError::NameTooLong(_))
    ));
    assert_consistent(&vol);
}

#[test]
fn delete_file_returns_units() {
    let mut vol = fresh_volume(UNITS);
    let before = vol.usage().unwrap();
    vol.copy_in(&payload(300), "f").unwrap();
    assert_eq!(vol.usage().unwrap().free_units, before.free_units - 300);

    assert!(matches!(vol.delete("f", true), Err(FsError::NotFound(_))));
    vol.delete("f", false).unwrap();

    assert_eq!(vol.usage().unwrap(), before);
    assert!(vol.list_current().unwrap().is_empty());
    assert!(matches!(vol.delete("f", false), Err(FsError::NotFound(_))));
    assert_consistent(&vol);
}

#[test]
fn freed_units_are_reused_first_fit() {
    let mut vol = fresh_volume(UNITS);
    let a = vol.copy_in(&payload(10), "a").unwrap();
    vol.copy_in(&payload(10), "b").unwrap();
    vol.delete("a", false).unwrap();

    let c = vol.copy_in(&payload(5), "c").unwrap();
    assert_eq!(c.start, a.start);

    // Un hueco de 5 no alcanza para 8: va después de "b"
    let d = vol.copy_in(&payload(8), "d").unwrap();
    assert!(d.start > a.end);
    assert_consistent(&vol);
}

#[test]
fn list_follows_physical_slot_order() {
    let mut vol = fresh_volume(UNITS);
    for n in ["a", "b", "c"] {
        vol.copy_in(b"1", n).unwrap();
    }
    vol.delete("a", false).unwrap();
    vol.copy_in(b"2", "d").unwrap();

    assert_eq!(names(&vol, vol.current_dir()), vec!["d", "b", "c"]);
}
