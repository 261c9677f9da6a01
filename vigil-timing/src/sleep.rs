use std::time::Duration;

/// Sleep with sub-millisecond accuracy where the platform allows it.
///
/// Used by the blocking runner to wait out the gap until the next timer
/// deadline without oversleeping past it.
pub fn precise_sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    #[cfg(target_os = "linux")]
    linux_sleep(duration);
    #[cfg(windows)]
    windows_sleep(duration);
    #[cfg(target_os = "macos")]
    macos_sleep(duration);
    #[cfg(not(any(target_os = "linux", windows, target_os = "macos")))]
    std::thread::sleep(duration);
}

#[cfg(target_os = "linux")]
fn linux_sleep(duration: Duration) {
    use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

    let req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };

    unsafe {
        clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
    }
}

#[cfg(windows)]
fn windows_sleep(duration: Duration) {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        CreateWaitableTimerW, INFINITE, SetWaitableTimer, WaitForSingleObject,
    };

    unsafe {
        let Ok(timer) = CreateWaitableTimerW(None, true, None) else {
            std::thread::sleep(duration);
            return;
        };

        // negative due time = relative, in 100ns intervals
        let due = -(duration.as_nanos() as i64 / 100);
        if SetWaitableTimer(timer, &due, 0, None, None, false).is_ok() {
            WaitForSingleObject(timer, INFINITE);
        } else {
            std::thread::sleep(duration);
        }

        let _ = CloseHandle(timer);
    }
}

#[cfg(target_os = "macos")]
fn macos_sleep(duration: Duration) {
    use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

    // spin only for very short waits; the thread scheduler is accurate
    // enough beyond 100us
    if duration.as_nanos() < 100_000 {
        unsafe {
            let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
            mach_timebase_info(&mut timebase);
            let start = mach_absolute_time();
            let target =
                duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;
            while mach_absolute_time() - start < target {
                std::hint::spin_loop();
            }
        }
    } else {
        std::thread::sleep(duration);
    }
}
