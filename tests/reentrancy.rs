use proto_collections::{ChainedHashMap, Equatable, Hashable, Orderable, Result, SkipList};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

// Key whose protocol methods call back into the container under test when
// `reenter` is set.
#[derive(Clone, Debug)]
struct Echo {
    id: i64,
    reenter: bool,
}

impl Echo {
    fn plain(id: i64) -> Self {
        Echo { id, reenter: false }
    }
    fn sneaky(id: i64) -> Self {
        Echo { id, reenter: true }
    }
}

thread_local! {
    static MAP: RefCell<Option<Rc<ChainedHashMap<Echo, i32>>>> = const { RefCell::new(None) };
    static LIST: RefCell<Option<Rc<SkipList<Echo, i32>>>> = const { RefCell::new(None) };
}

impl Equatable for Echo {
    fn eq_value(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hashable for Echo {
    fn hash_code(&self) -> Result<i64> {
        if self.reenter {
            MAP.with(|m| {
                if let Some(map) = m.borrow().as_ref() {
                    let _ = map.has(&Echo::plain(self.id));
                }
            });
        }
        Ok(self.id)
    }
}

impl Orderable for Echo {
    fn compare(&self, other: &Self) -> Result<Ordering> {
        if self.reenter || other.reenter {
            LIST.with(|l| {
                if let Some(list) = l.borrow().as_ref() {
                    let _ = list.has(&Echo::plain(self.id));
                }
            });
        }
        Ok(self.id.cmp(&other.id))
    }
}

fn shared_map() -> Rc<ChainedHashMap<Echo, i32>> {
    let mut m = ChainedHashMap::new();
    m.set(Echo::plain(1), 10).unwrap();
    m.set(Echo::plain(2), 20).unwrap();
    let m = Rc::new(m);
    MAP.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&m)));
    m
}

fn shared_list() -> Rc<SkipList<Echo, i32>> {
    let mut l = SkipList::new();
    l.set(Echo::plain(1), 10).unwrap();
    l.set(Echo::plain(2), 20).unwrap();
    let l = Rc::new(l);
    LIST.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&l)));
    l
}

#[test]
fn plain_keys_do_not_trip_the_guard() {
    let m = shared_map();
    assert_eq!(m.get(&Echo::plain(2)), Ok(&20));
    let l = shared_list();
    assert_eq!(l.get(&Echo::plain(1)), Ok(&10));
}

#[cfg(debug_assertions)]
#[test]
fn hash_map_reentry_panics_in_debug() {
    let m = shared_map();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = m.get(&Echo::sneaky(1));
    }));
    let msg = res.expect_err("re-entry must panic in debug builds");
    let text = msg
        .downcast_ref::<String>()
        .map(String::as_str)
        .unwrap_or_default();
    assert!(text.contains("`has` called while `get`"), "{text}");
    // The guard is released after the panic unwinds.
    assert_eq!(m.get(&Echo::plain(1)), Ok(&10));
}

#[cfg(debug_assertions)]
#[test]
fn skip_list_reentry_panics_in_debug() {
    let l = shared_list();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = l.has(&Echo::sneaky(2));
    }));
    assert!(res.is_err(), "expected re-entry to panic in debug builds");
    assert_eq!(l.has(&Echo::plain(2)), Ok(true));
}

#[cfg(not(debug_assertions))]
#[test]
fn reentry_is_unchecked_in_release() {
    let m = shared_map();
    assert_eq!(m.get(&Echo::sneaky(1)), Ok(&10));
    let l = shared_list();
    assert_eq!(l.has(&Echo::sneaky(2)), Ok(true));
}
