//! Lock-Free SPSC Variable-Length Message Queue
//!
//! Arena byte berukuran tetap yang diperlakukan sebagai penyimpanan circular.
//! Setiap record terdiri dari envelope (panjang payload + header user)
//! diikuti payload. Record boleh terpotong di ujung arena dan lanjut dari
//! offset 0, jadi arena bukan deretan record utuh.
//!
//! Satu byte arena selalu dibiarkan kosong supaya state kosong (`w == r`)
//! dan state penuh bisa dibedakan hanya dari nilai cursor.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Envelope di depan setiap payload
#[repr(C)]
#[derive(Clone, Copy)]
struct Envelope<H> {
    size: usize,
    header: H,
}

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Lock-Free SPSC queue untuk message dengan ukuran variabel
///
/// `H` adalah header fixed-size milik caller yang menempel di setiap record,
/// `N` adalah kapasitas arena dalam bytes. Push dan pop hanya bisa dilakukan
/// lewat [`Producer`] dan [`Consumer`] dari [`VarQueue::split`].
#[repr(C)]
pub struct VarQueue<H, const N: usize> {
    // Producer side - hanya producer yang menulis
    write_idx: CacheLinePadded<AtomicUsize>,
    // Consumer side - hanya consumer yang menulis
    read_idx: CacheLinePadded<AtomicUsize>,
    // Arena di heap, dialokasikan sekali saat init
    buffer: Box<[UnsafeCell<MaybeUninit<u8>>]>,
    _header: PhantomData<H>,
}

// SAFETY: Akses ke arena hanya lewat Producer/Consumer yang masing-masing
// unik (dipinjam dari &mut self di split). Region yang ditulis producer
// tidak pernah dibaca consumer sebelum write_idx di-publish (Release/Acquire),
// dan sebaliknya untuk read_idx.
unsafe impl<H: Send, const N: usize> Send for VarQueue<H, N> {}
unsafe impl<H: Send, const N: usize> Sync for VarQueue<H, N> {}

impl<H: Copy, const N: usize> Default for VarQueue<H, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy, const N: usize> VarQueue<H, N> {
    const ENVELOPE_SIZE: usize = mem::size_of::<Envelope<H>>();

    /// Membuat queue baru dengan arena `N` bytes.
    ///
    /// Alokasi hanya terjadi sekali di sini. Setelah itu, tidak ada alokasi
    /// di hot path.
    ///
    /// # Panics
    /// Panic jika `N` tidak lebih besar dari ukuran envelope (tidak ada
    /// record yang bisa muat).
    pub fn new() -> Self {
        assert!(
            N > Self::ENVELOPE_SIZE,
            "N must be larger than the record envelope ({} bytes)",
            Self::ENVELOPE_SIZE
        );

        let mut buffer = Vec::with_capacity(N);
        for _ in 0..N {
            buffer.push(UnsafeCell::new(MaybeUninit::uninit()));
        }

        Self {
            write_idx: CacheLinePadded::new(AtomicUsize::new(0)),
            read_idx: CacheLinePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
            _header: PhantomData,
        }
    }

    /// Memecah queue menjadi handle producer dan consumer.
    ///
    /// Masing-masing handle `Send` dan tidak bisa di-clone, jadi kontrak
    /// satu producer + satu consumer dijaga oleh borrow checker.
    pub fn split(&mut self) -> (Producer<'_, H, N>, Consumer<'_, H, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Kapasitas arena dalam bytes
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Ukuran envelope (panjang payload + header) per record
    #[inline(always)]
    pub const fn envelope_size(&self) -> usize {
        Self::ENVELOPE_SIZE
    }

    /// Payload terbesar yang masih bisa di-push ke queue kosong.
    ///
    /// Payload yang lebih besar akan selalu ditolak `push`.
    #[inline(always)]
    pub const fn max_payload(&self) -> usize {
        N - 1 - Self::ENVELOPE_SIZE
    }

    /// Jumlah bytes yang belum dikonsumsi (envelope + payload)
    #[inline(always)]
    pub fn len(&self) -> usize {
        let write = self.write_idx.value.load(Ordering::Acquire);
        let read = self.read_idx.value.load(Ordering::Acquire);
        used_bytes(write, read, N)
    }

    /// Ruang kosong dalam bytes, termasuk satu byte cadangan
    #[inline(always)]
    pub fn free_space(&self) -> usize {
        N - self.len()
    }

    /// Cek apakah queue kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        let write = self.write_idx.value.load(Ordering::Acquire);
        let read = self.read_idx.value.load(Ordering::Acquire);
        write == read
    }

    #[inline(always)]
    fn base_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.buffer.as_ptr()).cast::<u8>()
    }

    /// Copy `len` bytes ke arena mulai `pos`, dipecah dua di ujung arena.
    ///
    /// # Safety
    /// `pos < N`, `len < N`, `src` valid untuk `len` bytes, dan region tujuan
    /// tidak sedang dibaca consumer.
    #[inline(always)]
    unsafe fn write_wrapped(&self, pos: usize, src: *const u8, len: usize) {
        let base = self.base_ptr();
        let first_part = (N - pos).min(len);
        ptr::copy_nonoverlapping(src, base.add(pos), first_part);

        if first_part < len {
            ptr::copy_nonoverlapping(src.add(first_part), base, len - first_part);
        }
    }

    /// Copy `len` bytes dari arena mulai `pos`, dipecah dua di ujung arena.
    ///
    /// # Safety
    /// `pos < N`, `len < N`, `dst` valid untuk `len` bytes, dan region sumber
    /// sudah di-publish producer.
    #[inline(always)]
    unsafe fn read_wrapped(&self, pos: usize, dst: *mut u8, len: usize) {
        let base = self.base_ptr();
        let first_part = (N - pos).min(len);
        ptr::copy_nonoverlapping(base.add(pos), dst, first_part);

        if first_part < len {
            ptr::copy_nonoverlapping(base, dst.add(first_part), len - first_part);
        }
    }
}

/// Bytes yang terpakai di antara read cursor dan write cursor
#[inline(always)]
fn used_bytes(write: usize, read: usize, capacity: usize) -> usize {
    if write >= read {
        write - read
    } else {
        capacity - (read - write)
    }
}

/// Handle producer. Hanya ada satu per queue.
pub struct Producer<'a, H, const N: usize> {
    queue: &'a VarQueue<H, N>,
}

impl<'a, H: Copy, const N: usize> Producer<'a, H, N> {
    /// Push satu record (header + payload) ke queue
    ///
    /// Returns `true` jika berhasil, `false` jika ruang tidak cukup.
    /// `false` tidak mengubah state apapun, jadi aman di-retry. Payload yang
    /// lebih besar dari [`VarQueue::max_payload`] selalu `false`.
    /// Zero-allocation, lock-free, non-blocking.
    #[inline(always)]
    pub fn push(&mut self, header: &H, payload: &[u8]) -> bool {
        let queue = self.queue;
        let envelope_size = VarQueue::<H, N>::ENVELOPE_SIZE;
        let total_size = envelope_size.saturating_add(payload.len());

        let write = queue.write_idx.value.load(Ordering::Relaxed);
        // Acquire: consumer sudah selesai copy keluar dari region yang dia bebaskan
        let read = queue.read_idx.value.load(Ordering::Acquire);

        // Wajib sisa minimal satu byte setelah push
        let available = N - used_bytes(write, read, N);
        if available <= total_size {
            return false;
        }

        let envelope = Envelope {
            size: payload.len(),
            header: *header,
        };

        // SAFETY: total_size < available, jadi seluruh region [write, write + total_size)
        // (wrapped) bebas dan tidak disentuh consumer sampai write_idx di-publish.
        unsafe {
            queue.write_wrapped(
                write,
                (&envelope as *const Envelope<H>).cast::<u8>(),
                envelope_size,
            );
            queue.write_wrapped(
                (write + envelope_size) % N,
                payload.as_ptr(),
                payload.len(),
            );
        }

        // Release: semua bytes record visible sebelum cursor baru
        queue
            .write_idx
            .value
            .store((write + total_size) % N, Ordering::Release);

        true
    }

    /// Ruang kosong dilihat dari sisi producer
    #[inline(always)]
    pub fn free_space(&self) -> usize {
        self.queue.free_space()
    }

    /// Jumlah bytes yang belum dikonsumsi
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Cek apakah consumer sudah mengambil semua record
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Kapasitas arena dalam bytes
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Ukuran envelope per record
    #[inline(always)]
    pub const fn envelope_size(&self) -> usize {
        VarQueue::<H, N>::ENVELOPE_SIZE
    }

    /// Payload terbesar yang bisa di-push, lihat [`VarQueue::max_payload`]
    #[inline(always)]
    pub const fn max_payload(&self) -> usize {
        N - 1 - VarQueue::<H, N>::ENVELOPE_SIZE
    }
}

/// Handle consumer. Hanya ada satu per queue.
pub struct Consumer<'a, H, const N: usize> {
    queue: &'a VarQueue<H, N>,
}

impl<'a, H: Copy, const N: usize> Consumer<'a, H, N> {
    /// Pop satu record ke storage milik caller
    ///
    /// Returns `Some(payload_size)` jika ada record: `header` diisi dan
    /// payload di-copy ke `out[..payload_size]`. Returns `None` jika queue
    /// kosong, tanpa mengubah state.
    ///
    /// # Panics
    /// Panic jika `out` lebih pendek dari payload. Ukuran buffer adalah
    /// tanggung jawab caller; cursor tidak disentuh sebelum panic.
    #[inline(always)]
    pub fn pop(&mut self, header: &mut H, out: &mut [u8]) -> Option<usize> {
        let queue = self.queue;
        let envelope_size = VarQueue::<H, N>::ENVELOPE_SIZE;

        let read = queue.read_idx.value.load(Ordering::Relaxed);
        // Acquire: pasangan dari Release store di push
        let write = queue.write_idx.value.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let mut envelope = MaybeUninit::<Envelope<H>>::uninit();

        // SAFETY: read != write berarti minimal satu record utuh sudah di-publish
        // mulai dari read. Bytes envelope berasal dari Envelope<H> yang valid.
        let envelope = unsafe {
            queue.read_wrapped(read, envelope.as_mut_ptr().cast::<u8>(), envelope_size);
            envelope.assume_init()
        };

        let size = envelope.size;
        assert!(
            out.len() >= size,
            "output buffer too small: need {} bytes, got {}",
            size,
            out.len()
        );

        // SAFETY: payload record ini sudah di-publish dan out cukup panjang
        unsafe {
            queue.read_wrapped((read + envelope_size) % N, out.as_mut_ptr(), size);
        }

        *header = envelope.header;

        // Release: copy keluar selesai sebelum producer melihat ruang kosong
        queue
            .read_idx
            .value
            .store((read + envelope_size + size) % N, Ordering::Release);

        Some(size)
    }

    /// Jumlah bytes yang belum dikonsumsi
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Cek apakah queue kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Ruang kosong dalam bytes
    #[inline(always)]
    pub fn free_space(&self) -> usize {
        self.queue.free_space()
    }

    /// Kapasitas arena dalam bytes
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Ukuran envelope per record
    #[inline(always)]
    pub const fn envelope_size(&self) -> usize {
        VarQueue::<H, N>::ENVELOPE_SIZE
    }

    /// Payload terbesar per record; buffer `pop` sepanjang ini selalu cukup
    #[inline(always)]
    pub const fn max_payload(&self) -> usize {
        N - 1 - VarQueue::<H, N>::ENVELOPE_SIZE
    }
}
